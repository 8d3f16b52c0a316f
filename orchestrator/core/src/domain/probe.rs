// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Open-port report emitted by the in-container probe helper.
//!
//! One line per listening service:
//!
//! ```text
//! <port>=<label>[|<message>]
//! ```
//!
//! Surrounding whitespace is ignored, the `|message` part is optional and
//! lines that do not match are skipped.

/// Text the engine returns when the probe binary is missing from the image.
const EXECUTABLE_NOT_FOUND: &[&str] = &["executable file not found", "no such file or directory"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedPort {
    pub port: u16,
    pub label: String,
    pub message: String,
}

pub fn parse_probe_report(report: &str) -> Vec<ProbedPort> {
    report.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<ProbedPort> {
    let (port, rest) = line.trim().split_once('=')?;
    let port = port.trim().parse::<u16>().ok()?;

    let (label, message) = match rest.split_once('|') {
        Some((label, message)) => (label, message),
        None => (rest, ""),
    };

    Some(ProbedPort {
        port,
        label: label.trim().to_string(),
        message: message.trim().to_string(),
    })
}

/// Whether probe failure text only says the helper is not installed.
pub fn is_missing_executable(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    EXECUTABLE_NOT_FOUND.iter().any(|needle| text.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_open_ports() {
        let payload = "8080=label|msg\n\t3000=My webserver\n\t";

        let ports = parse_probe_report(payload);

        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].port, 8080);
        assert_eq!(ports[0].label, "label");
        assert_eq!(ports[0].message, "msg");
        assert_eq!(ports[1].port, 3000);
        assert_eq!(ports[1].label, "My webserver");
        assert_eq!(ports[1].message, "");
    }

    #[test]
    fn test_parse_skips_garbage() {
        let payload = "\nnot a port\nabc=label\n70000=too big\n  9999 = Projector | open it \n";

        let ports = parse_probe_report(payload);

        assert_eq!(
            ports,
            vec![ProbedPort {
                port: 9999,
                label: "Projector".into(),
                message: "open it".into(),
            }]
        );
    }

    #[test]
    fn test_missing_executable_detection() {
        assert!(is_missing_executable(
            "OCI runtime exec failed: exec: \"/usr/local/bin/open-ports\": executable file not found in $PATH"
        ));
        assert!(!is_missing_executable("permission denied"));
    }
}
