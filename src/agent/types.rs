//! Wire structures exchanged with the XDS agent (JSON, camelCase keys).

use serde::{Deserialize, Serialize};

/// Pushed when the event channel drops.
pub const EVT_DISCONNECTION: &str = "disconnection";
/// Output chunk of a running command.
pub const EXEC_OUT_EVENT: &str = "exec:output";
/// Termination of a running command.
pub const EXEC_EXIT_EVENT: &str = "exec:exit";
/// Any change of a project's state.
pub const EVT_PROJECT_CHANGE: &str = "event:project-state-change";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionData {
    pub id: String,
    pub version: String,
    pub api_version: String,
    pub git_tag: String,
}

/// Versions of the agent and of every server it is connected to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XdsVersion {
    pub client: VersionData,
    #[serde(alias = "server")]
    pub servers: Vec<VersionData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    pub id: String,
    pub server_id: String,
    pub label: String,
    pub client_path: String,
    pub server_path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub is_in_sync: bool,
    pub default_sdk: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sdk {
    pub id: String,
    pub name: String,
    pub profile: String,
    pub version: String,
    pub arch: String,
    pub path: String,
}

/// Body of `POST /exec`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecArgs {
    pub id: String,
    #[serde(rename = "sdkID", skip_serializing_if = "String::is_empty", default)]
    pub sdk_id: String,
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub rpath: String,
    #[serde(rename = "cmdTimeout")]
    pub cmd_timeout: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecOutMsg {
    #[serde(rename = "cmdID")]
    pub cmd_id: String,
    pub timestamp: String,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecExitMsg {
    #[serde(rename = "cmdID")]
    pub cmd_id: String,
    pub timestamp: String,
    pub code: i32,
    pub error: Option<String>,
}

/// Body of `POST /events/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRegisterArgs {
    pub name: String,
    #[serde(rename = "filterProjectID", skip_serializing_if = "Option::is_none")]
    pub filter_project_id: Option<String>,
}

/// Generic event envelope used for project notifications.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventMsg {
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

impl EventMsg {
    pub fn decode_project_config(&self) -> serde_json::Result<ProjectConfig> {
        serde_json::from_value(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exec_args_wire_names() {
        let args = ExecArgs {
            id: "prj".into(),
            sdk_id: String::new(),
            cmd: "make".into(),
            args: vec!["-j4".into()],
            env: vec!["A=1".into()],
            rpath: "src".into(),
            cmd_timeout: 60,
        };
        let v = serde_json::to_value(&args).unwrap();
        assert_eq!(v["id"], "prj");
        assert_eq!(v["cmdTimeout"], 60);
        assert_eq!(v["rpath"], "src");
        assert!(v.get("sdkID").is_none(), "empty sdk id is omitted");
    }

    #[test]
    fn project_config_from_agent_json() {
        let prj: ProjectConfig = serde_json::from_value(json!({
            "id": "abc",
            "serverId": "srv",
            "label": "hello",
            "clientPath": "/home/user/hello",
            "type": "PathMap",
            "isInSync": true
        }))
        .unwrap();
        assert_eq!(prj.client_path, "/home/user/hello");
        assert_eq!(prj.kind, "PathMap");
        assert!(prj.is_in_sync);
        assert!(prj.server_path.is_empty());
    }

    #[test]
    fn exit_msg_with_null_error() {
        let m: ExecExitMsg =
            serde_json::from_value(json!({"cmdID":"1","code":3,"error":null})).unwrap();
        assert_eq!(m.code, 3);
        assert_eq!(m.error, None);
    }

    #[test]
    fn event_msg_decodes_project() {
        let ev: EventMsg = serde_json::from_value(json!({
            "time": "now",
            "type": EVT_PROJECT_CHANGE,
            "data": {"id": "p1", "label": "L"}
        }))
        .unwrap();
        let prj = ev.decode_project_config().unwrap();
        assert_eq!(prj.id, "p1");
        assert_eq!(prj.label, "L");
    }
}
