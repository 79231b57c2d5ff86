//! Sandbox startup script
//!
//! Every sandbox runs ttyd on the shell port, optionally boots k3s, runs the
//! user's script and then idles so the container stays up.

use std::fmt::Write as _;

/// Seconds to wait before checking that ttyd survived startup
const TTYD_SETTLE_SECS: u32 = 3;

/// Shell script executed as the container's main process
#[must_use]
pub fn startup_script(port: u16, kubernetes: bool, user_script: Option<&str>) -> String {
    let mut script = String::from("#!/bin/sh\nset -e\n\n");

    let _ = writeln!(script, "echo \"Starting ttyd on port {port}...\"");
    let _ = writeln!(
        script,
        "ttyd -p {port} --writable -t disableReuse=true bash &"
    );
    script.push_str("TTYD_PID=$!\n");
    let _ = writeln!(script, "sleep {TTYD_SETTLE_SECS}");
    script.push_str(
        "if ! kill -0 $TTYD_PID 2>/dev/null; then\n    echo \"ERROR: ttyd failed to start\"\n    exit 1\nfi\n\n",
    );

    if kubernetes {
        script.push_str("echo \"Initializing k3s...\"\n/usr/local/bin/start-k3s.sh &\n\n");
    }

    if let Some(user) = user_script {
        script.push_str(user);
        if !user.ends_with('\n') {
            script.push('\n');
        }
        script.push('\n');
    }

    script.push_str("echo \"Container ready for terminal access\"\nsleep infinity\n");
    script
}

/// Container command running `script` through `sh`
#[must_use]
pub fn container_command(script: String) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_starts_ttyd_on_shell_port() {
        let script = startup_script(3000, false, None);
        assert!(script.contains("ttyd -p 3000"));
        assert!(script.ends_with("sleep infinity\n"));
        assert!(!script.contains("k3s"));
    }

    #[test]
    fn kubernetes_script_boots_k3s() {
        let script = startup_script(3000, true, None);
        assert!(script.contains("start-k3s.sh"));
    }

    #[test]
    fn user_script_runs_before_idle() {
        let script = startup_script(3000, false, Some("go mod init demo"));
        let user = script.find("go mod init demo").unwrap();
        let idle = script.find("sleep infinity").unwrap();
        assert!(user < idle);
    }
}
