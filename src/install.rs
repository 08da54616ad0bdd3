use crate::config::ConnectArgs;
use color_eyre::eyre::{eyre, Result, WrapErr};
use color_eyre::Help;
use serde_json::{json, Value};
use std::fs::File;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use std::{env, fs, io};

const SERVER_NAME: &str = "Minecraft";

fn install_claude(exe_path: &Path, connect: &ConnectArgs) -> Result<&'static str> {
    install_to_config(get_claude_config(), exe_path, connect, "Claude")
}

fn install_cursor(exe_path: &Path, connect: &ConnectArgs) -> Result<&'static str> {
    install_to_config(get_cursor_config(), exe_path, connect, "Cursor")
}

fn get_lm_studio_config() -> Result<PathBuf> {
    let home_dir = home_dir()?;
    if cfg!(target_os = "macos") {
        Ok(home_dir
            .join("Library")
            .join("Application Support")
            .join("LM Studio")
            .join("mcpServers.json"))
    } else if cfg!(target_os = "windows") {
        let app_data =
            env::var_os("APPDATA").ok_or_else(|| eyre!("Could not find APPDATA directory"))?;
        Ok(Path::new(&app_data)
            .join("LM Studio")
            .join("mcpServers.json"))
    } else {
        Ok(home_dir
            .join(".config")
            .join("LM Studio")
            .join("mcpServers.json"))
    }
}

fn install_lm_studio(exe_path: &Path, connect: &ConnectArgs) -> Result<&'static str> {
    install_to_config(get_lm_studio_config(), exe_path, connect, "LM Studio")?;
    install_lm_studio_plugin_files(&get_lm_studio_plugin_dir()?, exe_path, connect)?;
    Ok("LM Studio")
}

fn install_lm_studio_plugin_files(
    plugin_dir: &Path,
    exe_path: &Path,
    connect: &ConnectArgs,
) -> Result<()> {
    fs::create_dir_all(plugin_dir).wrap_err_with(|| {
        format!(
            "Failed to create LM Studio plugin directory at {}",
            plugin_dir.display()
        )
    })?;

    write_json_file(
        &plugin_dir.join("manifest.json"),
        &json!({
            "type": "plugin",
            "runner": "mcpBridge",
            "owner": "mcp",
            "name": "minecraft"
        }),
    )?;

    write_json_file(
        &plugin_dir.join("mcp-bridge-config.json"),
        &json!({
            "command": exe_path,
            "args": connect.to_cli_args(),
        }),
    )?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    write_json_file(
        &plugin_dir.join("install-state.json"),
        &json!({
            "by": "mcp-bridge-v1",
            "at": now,
        }),
    )?;

    println!(
        "Installed Minecraft MCP plugin to LM Studio plugin directory at {}",
        plugin_dir.display()
    );

    Ok(())
}

fn write_json_file(path: &Path, value: &Value) -> Result<()> {
    let mut file = File::create(path)
        .wrap_err_with(|| format!("Failed to create file at {}", path.display()))?;
    file.write_all(serde_json::to_string_pretty(value)?.as_bytes())
        .wrap_err_with(|| format!("Failed to write file at {}", path.display()))?;
    Ok(())
}

fn get_lm_studio_plugin_dir() -> Result<PathBuf> {
    Ok(home_dir()?
        .join(".lmstudio")
        .join("extensions")
        .join("plugins")
        .join("mcp")
        .join("minecraft"))
}

fn home_dir() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        env::var_os("USERPROFILE")
            .or_else(|| env::var_os("HOME"))
            .map(PathBuf::from)
            .ok_or_else(|| eyre!("Could not determine home directory"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| eyre!("Could not determine HOME directory"))
    }
}

fn get_message(successes: String, connect: &ConnectArgs) -> String {
    format!("Minecraft MCP is ready to go.
Restart your MCP clients to apply the changes.

MCP Clients set up:
{successes}

The bot will join {}:{} as {}. Start the bot runtime so it can attach to the bridge on port {}.",
        connect.host, connect.port, connect.username, connect.bridge_port)
}

// returns OS dependant claude_desktop_config.json path
fn get_claude_config() -> Result<PathBuf> {
    let config_path = if cfg!(target_os = "macos") {
        home_dir()?.join("Library/Application Support/Claude/claude_desktop_config.json")
    } else if cfg!(target_os = "windows") {
        let app_data =
            env::var_os("APPDATA").ok_or_else(|| eyre!("Could not find APPDATA directory"))?;
        Path::new(&app_data)
            .join("Claude")
            .join("claude_desktop_config.json")
    } else {
        return Err(eyre!("Unsupported operating system"));
    };

    Ok(config_path)
}

fn get_cursor_config() -> Result<PathBuf> {
    let home_dir = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .ok_or_else(|| eyre!("Could not determine home directory"))?;
    Ok(Path::new(&home_dir).join(".cursor").join("mcp.json"))
}

#[cfg(target_os = "macos")]
fn get_exe_path() -> Result<PathBuf> {
    use color_eyre::eyre::OptionExt;
    use core_foundation::url::CFURL;

    let local_path = env::current_exe()?;
    let local_path_cref =
        CFURL::from_path(local_path, false).ok_or_eyre("Could not resolve executable URL")?;
    let un_relocated = security_translocate::create_original_path_for_url(local_path_cref.clone())
        .or_else(move |_| Ok::<CFURL, io::Error>(local_path_cref.clone()))?;
    un_relocated
        .to_path()
        .ok_or_eyre("Could not resolve executable path")
}

#[cfg(not(target_os = "macos"))]
fn get_exe_path() -> io::Result<PathBuf> {
    env::current_exe()
}

pub fn install_to_config<'a>(
    config_path: Result<PathBuf>,
    exe_path: &Path,
    connect: &ConnectArgs,
    name: &'a str,
) -> Result<&'a str> {
    let config_path = config_path?;
    let mut config: serde_json::Map<String, Value> = {
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&config_path).map_err(|e| {
                eyre!("Could not create {name} config file at {config_path:?}: {e:#?}")
            })?;
            file.write_all(serde_json::to_string(&serde_json::Map::new())?.as_bytes())?;
        }
        let config_file = File::open(&config_path)
            .map_err(|error| eyre!("Could not read or create {name} config file: {error:#?}"))?;
        let reader = BufReader::new(config_file);
        serde_json::from_reader(reader)?
    };

    if !matches!(config.get("mcpServers"), Some(Value::Object(_))) {
        config.insert("mcpServers".to_string(), json!({}));
    }

    config["mcpServers"][SERVER_NAME] = json!({
      "command": &exe_path,
      "args": connect.to_cli_args(),
    });

    let mut file = File::create(&config_path)?;
    file.write_all(serde_json::to_string_pretty(&config)?.as_bytes())
        .map_err(|e| eyre!("Could not write to {name} config file at {config_path:?}: {e:#?}"))?;

    println!("Installed Minecraft MCP server to {name} config {config_path:?}");

    Ok(name)
}

/// Registers the server with every supported client, succeeding if at least one worked.
pub fn install_all(connect: &ConnectArgs) -> Result<()> {
    let this_exe = get_exe_path()?;

    let mut errors = vec![];
    let results = [
        install_claude(&this_exe, connect),
        install_cursor(&this_exe, connect),
        install_lm_studio(&this_exe, connect),
    ];

    let successes: Vec<_> = results
        .into_iter()
        .filter_map(|r| r.map_err(|e| errors.push(e)).ok())
        .collect();

    if successes.is_empty() {
        let error = errors.into_iter().fold(
            eyre!("Failed to install to any supported MCP clients"),
            |report, e| report.note(e),
        );
        return Err(error);
    }

    println!();
    println!("{}", get_message(successes.join("\n"), connect));
    Ok(())
}

pub fn interactive_install(connect: &ConnectArgs) -> Result<()> {
    use dialoguer::{theme::ColorfulTheme, Select};

    const OPTIONS: [&str; 5] = [
        "Install/Update Claude MCP connection",
        "Install/Update Cursor MCP connection",
        "Install/Update LM Studio MCP plugin",
        "Install/Update all of the above",
        "Exit",
    ];

    let theme = ColorfulTheme::default();

    loop {
        let selection = Select::with_theme(&theme)
            .with_prompt("Select an action to perform")
            .items(&OPTIONS)
            .default(0)
            .interact_opt()?;

        let Some(selection) = selection else {
            println!("Exiting installer.");
            break;
        };

        let label = OPTIONS[selection];
        match selection {
            0 => run_task(label, || {
                let exe = get_exe_path()?;
                install_claude(&exe, connect).map(|_| ())
            }),
            1 => run_task(label, || {
                let exe = get_exe_path()?;
                install_cursor(&exe, connect).map(|_| ())
            }),
            2 => run_task(label, || {
                let exe = get_exe_path()?;
                install_lm_studio(&exe, connect).map(|_| ())
            }),
            3 => run_task(label, || install_all(connect)),
            4 => {
                println!("Exiting installer.");
                break;
            }
            _ => unreachable!(),
        }
    }

    Ok(())
}

fn run_task<F>(label: &str, task: F)
where
    F: FnOnce() -> Result<()>,
{
    match task() {
        Ok(_) => println!("{label} completed successfully.\n"),
        Err(error) => {
            eprintln!("{label} failed: {error:#}");
            println!();
        }
    }
}
