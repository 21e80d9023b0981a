//! Replay-latest state channels consumed by UI and audio-routing collaborators.
//!
//! Each channel holds exactly the latest value and delivers every subsequent
//! update to active subscribers; a fresh subscriber immediately observes the
//! current value.

use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::watch;

use crate::state::CallState;
use crate::types::{AudioDevice, Recipient};

/// Selected audio output device and the set currently available.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AudioDeviceUpdate {
    pub selected: AudioDevice,
    pub available: HashSet<AudioDevice>,
}

// Macro to generate the channel fields, constructor and subscribe methods.
macro_rules! define_state_channels {
    ($(($field:ident, $subscribe:ident, $type:ty, $default:expr)),* $(,)?) => {
        /// One watch channel per published session attribute.
        pub struct CallEvents {
            $(
                pub(crate) $field: watch::Sender<$type>,
            )*
        }

        impl CallEvents {
            pub(crate) fn new() -> Self {
                Self {
                    $(
                        $field: watch::channel($default).0,
                    )*
                }
            }

            $(
                pub fn $subscribe(&self) -> watch::Receiver<$type> {
                    self.$field.subscribe()
                }
            )*
        }
    };
}

define_state_channels! {
    (audio_enabled, subscribe_audio_enabled, bool, false),
    (video_enabled, subscribe_video_enabled, bool, false),
    (remote_video_enabled, subscribe_remote_video_enabled, bool, false),
    (call_state, subscribe_call_state, CallState, CallState::Idle),
    (audio_device, subscribe_audio_device, AudioDeviceUpdate, AudioDeviceUpdate::default()),
    (recipient, subscribe_recipient, Option<Recipient>, None),
}

impl Default for CallEvents {
    fn default() -> Self {
        Self::new()
    }
}
