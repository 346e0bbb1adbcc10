//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Huddle Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[relay]
# host = "0.0.0.0"
# port = 8787
# max_name_len = 24      # 8-64

[room]
# relay_url = "ws://localhost:8787"
# preferred_name = ""    # empty keeps the name the relay assigns
# ice_servers = ["stun:stun.l.google.com:19302"]
# connect_timeout_secs = 15   # 1-60
# signal_grace_secs = 5       # 0-30, hold offers that arrive before their join

[speaking]
# poll_interval_ms = 100      # 20-1000
# level_threshold = 0.02      # 0.0-1.0

[audio]
# noise_suppression = false
# vad_threshold = 0.85        # 0.5-0.98
# hold_frames = 10            # 1-100

[logging]
# level = "info"              # trace, debug, info, warn, error
"##
    .to_string()
}
