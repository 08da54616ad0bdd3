use crate::flight::DEFAULT_FLIGHT_TIMEOUT;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

pub const BRIDGE_PORT: u16 = 44756;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const ACTION_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Offline,
    Microsoft,
}

/// Game server connection and bridge settings shared by `server` and `install`.
#[derive(Debug, Clone, clap::Args)]
pub struct ConnectArgs {
    /// Minecraft server host
    #[arg(long, global = true, env = "MINECRAFT_HOST", default_value = "localhost")]
    pub host: String,

    /// Minecraft server port
    #[arg(long, global = true, env = "MINECRAFT_PORT", default_value_t = 25565)]
    pub port: u16,

    /// Username the bot joins with
    #[arg(long, global = true, env = "MINECRAFT_USERNAME", default_value = "LLMBot")]
    pub username: String,

    /// Authentication mode used by the bot runtime
    #[arg(long, global = true, value_enum, env = "MINECRAFT_AUTH", default_value_t = AuthMode::Offline)]
    pub auth: AuthMode,

    /// Protocol version to join with; the runtime auto-detects when omitted
    #[arg(long, global = true, env = "MINECRAFT_VERSION")]
    pub mc_version: Option<String>,

    /// Local port the bot runtime connects to
    #[arg(long, global = true, env = "MINECRAFT_BRIDGE_PORT", default_value_t = BRIDGE_PORT)]
    pub bridge_port: u16,

    /// Seconds to wait for quick bot queries
    #[arg(long, global = true, env = "MINECRAFT_REQUEST_TIMEOUT_SECS", default_value_t = REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Seconds to wait for pathfinding and digging
    #[arg(long, global = true, env = "MINECRAFT_ACTION_TIMEOUT_SECS", default_value_t = ACTION_TIMEOUT_SECS)]
    pub action_timeout_secs: u64,

    /// Seconds before an in-progress flight is abandoned
    #[arg(long, global = true, env = "MINECRAFT_FLIGHT_TIMEOUT_SECS", default_value_t = DEFAULT_FLIGHT_TIMEOUT.as_secs())]
    pub flight_timeout_secs: u64,
}

/// What the bot runtime needs to join the game server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMode,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTimeouts {
    pub request: Duration,
    pub action: Duration,
}

impl Default for BridgeTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            action: Duration::from_secs(ACTION_TIMEOUT_SECS),
        }
    }
}

impl ConnectArgs {
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            auth: self.auth,
            version: self.mc_version.clone(),
        }
    }

    pub fn timeouts(&self) -> BridgeTimeouts {
        BridgeTimeouts {
            request: Duration::from_secs(self.request_timeout_secs),
            action: Duration::from_secs(self.action_timeout_secs),
        }
    }

    pub fn flight_timeout(&self) -> Duration {
        Duration::from_secs(self.flight_timeout_secs)
    }

    /// Flags that reproduce these settings, for MCP client configs.
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--username".to_string(),
            self.username.clone(),
        ];
        if self.auth != AuthMode::Offline {
            args.push("--auth".to_string());
            args.push("microsoft".to_string());
        }
        if let Some(version) = &self.mc_version {
            args.push("--mc-version".to_string());
            args.push(version.clone());
        }
        if self.bridge_port != BRIDGE_PORT {
            args.push("--bridge-port".to_string());
            args.push(self.bridge_port.to_string());
        }
        let timeouts = [
            ("--request-timeout-secs", self.request_timeout_secs, REQUEST_TIMEOUT_SECS),
            ("--action-timeout-secs", self.action_timeout_secs, ACTION_TIMEOUT_SECS),
            (
                "--flight-timeout-secs",
                self.flight_timeout_secs,
                DEFAULT_FLIGHT_TIMEOUT.as_secs(),
            ),
        ];
        for (flag, value, default) in timeouts {
            if value != default {
                args.push(flag.to_string());
                args.push(value.to_string());
            }
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        connect: ConnectArgs,
    }

    const VARS: [&str; 9] = [
        "MINECRAFT_HOST",
        "MINECRAFT_PORT",
        "MINECRAFT_USERNAME",
        "MINECRAFT_AUTH",
        "MINECRAFT_VERSION",
        "MINECRAFT_BRIDGE_PORT",
        "MINECRAFT_REQUEST_TIMEOUT_SECS",
        "MINECRAFT_ACTION_TIMEOUT_SECS",
        "MINECRAFT_FLIGHT_TIMEOUT_SECS",
    ];

    #[test]
    fn defaults_without_flags_or_env() {
        temp_env::with_vars_unset(VARS, || {
            let cli = TestCli::try_parse_from(["minecraft-mcp"]).expect("parse");
            let session = cli.connect.session();
            assert_eq!(session.host, "localhost");
            assert_eq!(session.port, 25565);
            assert_eq!(session.username, "LLMBot");
            assert_eq!(session.auth, AuthMode::Offline);
            assert_eq!(session.version, None);
            assert_eq!(cli.connect.bridge_port, BRIDGE_PORT);
            assert_eq!(cli.connect.timeouts(), BridgeTimeouts::default());
            assert_eq!(cli.connect.flight_timeout(), DEFAULT_FLIGHT_TIMEOUT);
        });
    }

    #[test]
    fn environment_supplies_credentials() {
        temp_env::with_vars(
            [
                ("MINECRAFT_HOST", Some("mc.example.net")),
                ("MINECRAFT_USERNAME", Some("Builder")),
                ("MINECRAFT_AUTH", Some("microsoft")),
                ("MINECRAFT_PORT", None),
                ("MINECRAFT_VERSION", None),
                ("MINECRAFT_BRIDGE_PORT", None),
                ("MINECRAFT_REQUEST_TIMEOUT_SECS", None),
                ("MINECRAFT_ACTION_TIMEOUT_SECS", None),
                ("MINECRAFT_FLIGHT_TIMEOUT_SECS", None),
            ],
            || {
                let cli = TestCli::try_parse_from(["minecraft-mcp", "--port", "25570"])
                    .expect("parse");
                let session = cli.connect.session();
                assert_eq!(session.host, "mc.example.net");
                assert_eq!(session.port, 25570);
                assert_eq!(session.username, "Builder");
                assert_eq!(session.auth, AuthMode::Microsoft);
            },
        );
    }

    #[test]
    fn cli_args_round_trip_non_default_settings() {
        temp_env::with_vars_unset(VARS, || {
            let cli = TestCli::try_parse_from([
                "minecraft-mcp",
                "--host",
                "10.0.0.5",
                "--auth",
                "microsoft",
                "--mc-version",
                "1.20.4",
                "--bridge-port",
                "50000",
            ])
            .expect("parse");
            let args = cli.connect.to_cli_args();
            assert_eq!(
                args,
                [
                    "--host",
                    "10.0.0.5",
                    "--port",
                    "25565",
                    "--username",
                    "LLMBot",
                    "--auth",
                    "microsoft",
                    "--mc-version",
                    "1.20.4",
                    "--bridge-port",
                    "50000",
                ]
            );
        });
    }

    #[test]
    fn timeouts_come_from_env_and_survive_install() {
        let vars = VARS.map(|var| match var {
            "MINECRAFT_FLIGHT_TIMEOUT_SECS" => (var, Some("45")),
            "MINECRAFT_ACTION_TIMEOUT_SECS" => (var, Some("300")),
            _ => (var, None),
        });
        temp_env::with_vars(vars, || {
            let cli = TestCli::try_parse_from(["minecraft-mcp"]).expect("parse");
            assert_eq!(cli.connect.flight_timeout(), Duration::from_secs(45));
            assert_eq!(cli.connect.timeouts().action, Duration::from_secs(300));
            assert_eq!(
                cli.connect.timeouts().request,
                BridgeTimeouts::default().request
            );

            let args = cli.connect.to_cli_args();
            assert_eq!(
                args[6..],
                ["--action-timeout-secs", "300", "--flight-timeout-secs", "45"]
            );
        });
    }

    #[test]
    fn session_serializes_for_the_runtime() {
        let session = SessionConfig {
            host: "localhost".to_string(),
            port: 25565,
            username: "LLMBot".to_string(),
            auth: AuthMode::Offline,
            version: None,
        };
        assert_eq!(
            serde_json::to_value(&session).expect("serialize"),
            serde_json::json!({
                "host": "localhost",
                "port": 25565,
                "username": "LLMBot",
                "auth": "offline",
                "version": null,
            })
        );
    }
}
