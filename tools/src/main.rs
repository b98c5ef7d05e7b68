mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use karukan_addon_core::logging::init_logging;
use karukan_addon_core::testing::{
    CallLog, HostEvent, PanelSnapshot, RecordingContext, ScriptedBackend,
};
use karukan_addon_core::{
    AddonFactory, AddonManager, Backend, CapabilityFlags, InputContext, InputContextId,
    InputContextManager, InputMethodEngine, InputMethodEntry, KarukanAddon, KarukanAddonFactory,
};
use karukan_ffi::{ffi_backend_factory, KarukanLibrary};
use serde_json::json;
use tracing::info;

use script::{capability_flags, parse_actions, Action, Scenario};

#[derive(Parser)]
#[command(name = "karukan-replay")]
#[command(about = "Replay key sequences through the Karukan input method addon")]
#[command(version)]
struct Cli {
    /// Print one JSON object per step
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file against a scripted engine
    Scenario {
        /// Scenario TOML file
        file: PathBuf,
    },
    /// Drive the real engine library
    Live {
        /// Engine shared library (default: $KARUKAN_LIBRARY, then libkarukan_im.so)
        #[arg(long)]
        library: Option<PathBuf>,
        /// Directory containing karukan-addon.toml
        #[arg(long)]
        config_dir: Option<PathBuf>,
        /// Pretend the client draws its own preedit
        #[arg(long)]
        client_preedit: bool,
        /// Keys and commands, e.g. `k y o u space select:0 deactivate`
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

/// What one replayed action produced on the host side.
struct Step {
    token: String,
    /// `None` for actions that are not key events
    consumed: Option<bool>,
    events: Vec<HostEvent>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let steps = match cli.command {
        Commands::Scenario { file } => run_scenario(&file)?,
        Commands::Live {
            library,
            config_dir,
            client_preedit,
            keys,
        } => run_live(library, config_dir, client_preedit, &keys)?,
    };

    for step in &steps {
        if cli.json {
            println!("{}", step_json(step));
        } else {
            print_step(step);
        }
    }
    Ok(())
}

fn run_scenario(file: &Path) -> Result<Vec<Step>> {
    let scenario = Scenario::load(file)?;
    init_logging(&scenario.config.log_filter);
    info!(
        file = %file.display(),
        frames = scenario.frames.len(),
        keys = scenario.keys.len(),
        "replaying scenario"
    );
    replay_scenario(&scenario)
}

fn replay_scenario(scenario: &Scenario) -> Result<Vec<Step>> {
    let actions = scenario.actions()?;

    let log = CallLog::new();
    let backend_log = log.clone();
    let frames = scenario.frames.clone();
    let init_code = scenario.init_code;
    let mut manager = InputContextManager::new();
    let mut addon = KarukanAddon::new(
        &mut manager,
        scenario.config.clone(),
        Box::new(move || {
            Some(
                ScriptedBackend::new(backend_log.clone())
                    .with_init_code(init_code)
                    .with_frames(frames.clone()),
            )
        }),
    )?;

    let mut ic = RecordingContext::new(InputContextId(1))
        .with_capabilities(capability_flags(&scenario.capabilities))
        .with_call_log(log);
    if let Some(text) = &scenario.surrounding_text {
        ic = ic.with_surrounding_text(text, scenario.cursor);
    }

    Ok(replay(&mut addon, &mut ic, &scenario.keys, &actions))
}

fn run_live(
    library: Option<PathBuf>,
    config_dir: Option<PathBuf>,
    client_preedit: bool,
    keys: &[String],
) -> Result<Vec<Step>> {
    let actions = parse_actions(keys)?;
    let lib = match library {
        Some(path) => KarukanLibrary::open(path)?,
        None => KarukanLibrary::open_default()?,
    };
    let lib = Arc::new(lib);

    let mut manager = AddonManager::new();
    if let Some(dir) = config_dir {
        manager = manager.with_config_dir(dir);
    }
    let factory = KarukanAddonFactory::new(ffi_backend_factory(lib.clone()));
    let mut addon = factory.create(&mut manager).context("creating addon")?;
    info!(library = %lib.path().display(), keys = keys.len(), "replaying against engine");

    let capabilities = if client_preedit {
        CapabilityFlags::PREEDIT
    } else {
        CapabilityFlags::NONE
    };
    let mut ic = RecordingContext::new(InputContextId(1)).with_capabilities(capabilities);

    Ok(replay(&mut addon, &mut ic, keys, &actions))
}

/// Feed `actions` to one input context, collecting the host events of each.
fn replay<B: Backend + 'static>(
    addon: &mut KarukanAddon<B>,
    ic: &mut RecordingContext,
    tokens: &[String],
    actions: &[Action],
) -> Vec<Step> {
    let entry = InputMethodEntry::karukan();
    addon.bind_input_context(ic.id());

    let mut steps = Vec::with_capacity(actions.len());
    for (token, action) in tokens.iter().zip(actions) {
        ic.clear_events();
        let consumed = match action {
            Action::Key(event) => {
                let mut event = event.clone();
                addon.key_event(&entry, ic, &mut event);
                Some(event.filtered())
            }
            Action::Select(index) => {
                addon.select_candidate(ic, *index);
                None
            }
            Action::Activate => {
                addon.activate(&entry, ic);
                None
            }
            Action::Deactivate => {
                addon.deactivate(&entry, ic);
                None
            }
            Action::Reset => {
                addon.reset(&entry, ic);
                None
            }
        };
        steps.push(Step {
            token: token.clone(),
            consumed,
            events: ic.host_events(),
        });
    }

    addon.release_input_context(ic.id());
    steps
}

fn print_step(step: &Step) {
    match step.consumed {
        Some(true) => println!("> {} (consumed)", step.token),
        Some(false) => println!("> {} (passed through)", step.token),
        None => println!("> {}", step.token),
    }
    for event in &step.events {
        match event {
            HostEvent::Commit(text) => println!("  commit {:?}", text),
            HostEvent::UpdatePreedit => {}
            HostEvent::UpdateUserInterface { panel, .. } => {
                println!("  panel {}", describe_panel(panel))
            }
        }
    }
}

fn describe_panel(panel: &PanelSnapshot) -> String {
    let mut parts = Vec::new();

    let preedit = if panel.client_preedit.is_empty() {
        &panel.preedit
    } else {
        &panel.client_preedit
    };
    if !preedit.is_empty() {
        parts.push(format!("preedit={:?}", preedit));
        if let Some(caret) = panel.preedit_cursor {
            parts.push(format!("caret={}", caret));
        }
    }
    if !panel.aux_up.is_empty() {
        parts.push(format!("aux={:?}", panel.aux_up));
    }
    if let Some(candidates) = &panel.candidates {
        parts.push(format!("candidates=[{}]", candidates.join(", ")));
        if let Some(cursor) = panel.candidate_cursor {
            parts.push(format!("cursor={}", cursor));
        }
    }

    if parts.is_empty() {
        "(empty)".to_string()
    } else {
        parts.join(" ")
    }
}

fn step_json(step: &Step) -> serde_json::Value {
    let events: Vec<serde_json::Value> = step
        .events
        .iter()
        .filter_map(|event| match event {
            HostEvent::Commit(text) => Some(json!({ "commit": text })),
            HostEvent::UpdatePreedit => None,
            HostEvent::UpdateUserInterface { panel, .. } => Some(json!({
                "panel": {
                    "preedit": panel.preedit,
                    "client_preedit": panel.client_preedit,
                    "caret": panel.preedit_cursor,
                    "aux": panel.aux_up,
                    "candidates": panel.candidates,
                    "cursor": panel.candidate_cursor,
                }
            })),
        })
        .collect();

    json!({
        "step": step.token,
        "consumed": step.consumed,
        "events": events,
    })
}
