//! Transport-neutral command surface.
//! Hosts forward a method name (over whatever channel they use) and get back a
//! serializable reply. Unknown methods are answered with `NotImplemented`.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::session::MicService;

/// Methods understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartMonitoring,
    StopMonitoring,
    GetLevel,
}

impl Command {
    pub fn from_method(name: &str) -> Option<Self> {
        match name {
            "startAudioMonitoring" => Some(Command::StartMonitoring),
            "stopAudioMonitoring" => Some(Command::StopMonitoring),
            "getAudioLevel" => Some(Command::GetLevel),
            _ => None,
        }
    }

    pub fn method_name(self) -> &'static str {
        match self {
            Command::StartMonitoring => "startAudioMonitoring",
            Command::StopMonitoring => "stopAudioMonitoring",
            Command::GetLevel => "getAudioLevel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Success { value: Value },
    Error { code: String, message: String },
    NotImplemented { method: String },
}

/// Run one host request against the service.
pub fn dispatch(service: &MicService, method: &str) -> Reply {
    let Some(command) = Command::from_method(method) else {
        debug!(method, "unknown method");
        return Reply::NotImplemented {
            method: method.to_string(),
        };
    };

    let outcome = match command {
        Command::StartMonitoring => service.start_session().map(|()| json!(true)),
        Command::StopMonitoring => service.stop_session().map(|()| json!(true)),
        Command::GetLevel => Ok(json!(service.get_current_level())),
    };

    match outcome {
        Ok(value) => Reply::Success { value },
        Err(e) => Reply::Error {
            code: e.code().to_string(),
            message: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::scripted::ScriptedBackend;
    use crate::config::MicConfig;

    #[test]
    fn method_names_round_trip() {
        for cmd in [Command::StartMonitoring, Command::StopMonitoring, Command::GetLevel] {
            assert_eq!(Command::from_method(cmd.method_name()), Some(cmd));
        }
        assert_eq!(Command::from_method("startRecording"), None);
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let service = MicService::new(ScriptedBackend::default(), MicConfig::default()).unwrap();
        assert_eq!(
            dispatch(&service, "reboot"),
            Reply::NotImplemented {
                method: "reboot".into()
            }
        );
    }

    #[test]
    fn level_before_start_is_zero() {
        let service = MicService::new(ScriptedBackend::default(), MicConfig::default()).unwrap();
        assert_eq!(
            dispatch(&service, "getAudioLevel"),
            Reply::Success { value: json!(0.0) }
        );
    }

    #[test]
    fn permission_error_is_reported_with_code() {
        let backend = ScriptedBackend {
            deny_permission: true,
            ..ScriptedBackend::default()
        };
        let service = MicService::new(backend, MicConfig::default()).unwrap();
        match dispatch(&service, "startAudioMonitoring") {
            Reply::Error { code, .. } => assert_eq!(code, "PERMISSION_DENIED"),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn start_and_stop_reply_true() {
        let service = MicService::new(ScriptedBackend::default(), MicConfig::default()).unwrap();
        assert_eq!(
            dispatch(&service, "startAudioMonitoring"),
            Reply::Success { value: json!(true) }
        );
        assert_eq!(
            dispatch(&service, "stopAudioMonitoring"),
            Reply::Success { value: json!(true) }
        );
    }

    #[test]
    fn reply_serializes_with_status_tag() {
        let reply = Reply::Error {
            code: "INIT_FAILED".into(),
            message: "no device".into(),
        };
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["code"], "INIT_FAILED");
    }
}
