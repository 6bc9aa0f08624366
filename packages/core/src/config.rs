/// Configuration for the node service
use serde::{Deserialize, Serialize};

/// A socket created on every new node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketConfig {
    pub name: String,
    /// `INPUT` or `OUTPUT`
    pub kind: String,
}

impl SocketConfig {
    fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeStageConfig {
    /// Backend type name of node records
    pub node_type_name: String,

    /// Type name of system entities; systems are not attached to themselves
    pub system_type_name: String,

    /// Type name of application entities; applications are not attached to
    /// the application node
    pub application_type_name: String,

    /// Backend type name of change-sets
    pub change_set_type_name: String,

    /// Name given to a change-set created on demand
    pub default_change_set_name: String,

    /// Socket an edge leaves from
    pub output_socket: String,

    /// Socket an edge arrives at
    pub input_socket: String,

    pub default_sockets: Vec<SocketConfig>,

    /// Filter used by `logging::init_tracing` when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for NodeStageConfig {
    fn default() -> Self {
        Self {
            node_type_name: "node".to_string(),
            system_type_name: "system".to_string(),
            application_type_name: "application_entity".to_string(),
            change_set_type_name: "changeSet".to_string(),
            default_change_set_name: "default".to_string(),
            output_socket: "output".to_string(),
            input_socket: "input".to_string(),
            default_sockets: vec![
                SocketConfig::new("input", "INPUT"),
                SocketConfig::new("output", "OUTPUT"),
            ],
            log_filter: "info".to_string(),
        }
    }
}

impl NodeStageConfig {
    /// Parse a JSON configuration; absent keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("invalid configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let names = [
            ("node_type_name", &self.node_type_name),
            ("system_type_name", &self.system_type_name),
            ("application_type_name", &self.application_type_name),
            ("change_set_type_name", &self.change_set_type_name),
            ("default_change_set_name", &self.default_change_set_name),
            ("output_socket", &self.output_socket),
            ("input_socket", &self.input_socket),
        ];
        for (field, value) in names {
            if value.is_empty() {
                return Err(format!("{} cannot be empty", field));
            }
        }

        for socket in &self.default_sockets {
            if socket.kind != "INPUT" && socket.kind != "OUTPUT" {
                return Err(format!(
                    "socket '{}' has kind '{}', expected INPUT or OUTPUT",
                    socket.name, socket.kind
                ));
            }
        }

        Ok(())
    }
}
