//! Per-section validators: relay, room, speaking, and audio.

use crate::schema::HuddleConfig;

use super::helpers::{check_nonzero, check_range, check_ws_url};

pub(crate) fn validate_relay(errors: &mut Vec<String>, config: &HuddleConfig) {
    check_nonzero(errors, "relay.port", config.relay.port);
    check_range(
        errors,
        "relay.max_name_len",
        config.relay.max_name_len,
        8,
        64,
    );
}

pub(crate) fn validate_room(errors: &mut Vec<String>, config: &HuddleConfig) {
    check_ws_url(errors, "room.relay_url", &config.room.relay_url);
    check_range(
        errors,
        "room.connect_timeout_secs",
        config.room.connect_timeout_secs,
        1,
        60,
    );
    check_range(
        errors,
        "room.signal_grace_secs",
        config.room.signal_grace_secs,
        0,
        30,
    );
}

pub(crate) fn validate_speaking(errors: &mut Vec<String>, config: &HuddleConfig) {
    check_range(
        errors,
        "speaking.poll_interval_ms",
        config.speaking.poll_interval_ms,
        20,
        1000,
    );
    check_range(
        errors,
        "speaking.level_threshold",
        config.speaking.level_threshold,
        0.0,
        1.0,
    );
}

pub(crate) fn validate_audio(errors: &mut Vec<String>, config: &HuddleConfig) {
    check_range(
        errors,
        "audio.vad_threshold",
        config.audio.vad_threshold,
        0.5,
        0.98,
    );
    check_range(errors, "audio.hold_frames", config.audio.hold_frames, 1, 100);
}
