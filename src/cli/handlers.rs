use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use super::commands::Commands;
use crate::config::{self, Config};
use crate::controller::{Controller, ModalKind};
use crate::entity::short_id;
use crate::error::{Result, TrackbookError, ValidationError};
use crate::storage::{FileBackend, Patch};
use crate::transfer::{CsvDialect, Format, ImportPolicy};
use crate::view::{parse_query, Query, SortState};
use crate::warnings::format_warning;
use crate::workspace::{
    AgileWorkspace, AppKind, Entry, InventoryWorkspace, SchoolWorkspace, TelehealthWorkspace,
    TransportWorkspace, Workspace,
};

pub fn handle_init(app: Option<&str>) -> Result<()> {
    let root = env::current_dir()?;
    let app = match app {
        Some(raw) => parse_app(raw)?,
        None => AppKind::default(),
    };

    config::init(&root, app)?;

    println!("Initialized trackbook project in {}", root.display());
    println!("  default app: {}", app);

    Ok(())
}

/// Run any command other than `init` against the current project.
pub fn handle_command(app: Option<&str>, command: Commands) -> Result<()> {
    let root = config::find_project_root()?;
    let config = Config::load(&root)?;
    let app = match app {
        Some(raw) => parse_app(raw)?,
        None => config.app,
    };
    tracing::debug!(root = %root.display(), app = %app, "resolved project");

    match app {
        AppKind::School => run::<SchoolWorkspace>(&root, &config, command),
        AppKind::Inventory => run::<InventoryWorkspace>(&root, &config, command),
        AppKind::Agile => run::<AgileWorkspace>(&root, &config, command),
        AppKind::Transport => run::<TransportWorkspace>(&root, &config, command),
        AppKind::Telehealth => run::<TelehealthWorkspace>(&root, &config, command),
    }
}

fn run<W: Workspace>(root: &Path, config: &Config, command: Commands) -> Result<()> {
    let backend = FileBackend::open(&config::data_dir(root))?;
    let mut ctl = Controller::<W>::open(Box::new(backend))
        .with_import_settings(config.csv_dialect, config.import_policy);
    for warning in ctl.warnings() {
        eprintln!("{}", format_warning(warning));
    }

    match command {
        Commands::Init => Err(TrackbookError::AlreadyInitialized),
        Commands::List {
            collection,
            query,
            search,
            filters,
            sort,
            desc,
            json,
        } => {
            let kind = parse_kind::<W>(&collection)?;
            let mut q = query.as_deref().map(parse_query).unwrap_or_default();
            if let Some(text) = search {
                q = q.with_text(text);
            }
            for filter in &filters {
                let (name, value) = split_assignment(filter)?;
                q = q.with_facet(name, value);
            }
            handle_list(&mut ctl, kind, q, &sort, desc, json)
        }
        Commands::Get {
            collection,
            id,
            json,
        } => handle_get(&mut ctl, parse_kind::<W>(&collection)?, &id, json),
        Commands::Add {
            collection,
            fields,
            json,
        } => handle_add(&mut ctl, parse_kind::<W>(&collection)?, &fields, json),
        Commands::Update {
            collection,
            id,
            fields,
            patch,
            json,
        } => handle_update(&mut ctl, parse_kind::<W>(&collection)?, &id, &fields, patch, json),
        Commands::Delete {
            collection,
            id,
            force,
        } => handle_delete(&mut ctl, parse_kind::<W>(&collection)?, &id, force),
        Commands::Import {
            collection,
            file,
            format,
            dialect,
            policy,
        } => handle_import(
            &mut ctl,
            parse_kind::<W>(&collection)?,
            file,
            format,
            dialect,
            policy,
        ),
        Commands::Export {
            collection,
            format,
            output,
        } => {
            let kind = parse_kind::<W>(&collection)?;
            let format = parse_arg::<Format>(&format)?;
            write_output(&ctl.export(kind, format)?, output.as_deref())
        }
        Commands::Template { collection, output } => {
            let kind = parse_kind::<W>(&collection)?;
            write_output(&ctl.template(kind), output.as_deref())
        }
        Commands::Stats { json } => handle_stats(&ctl, json),
        Commands::Theme { mode } => handle_theme(&mut ctl, mode.as_deref()),
    }
}

fn handle_list<W: Workspace>(
    ctl: &mut Controller<W>,
    kind: W::Kind,
    query: Query,
    sort: &[String],
    desc: bool,
    json: bool,
) -> Result<()> {
    ctl.set_query(query);
    for key in sort {
        ctl.select_sort(key);
    }
    if desc {
        if let Some(key) = ctl.sort_state().key().map(str::to_string) {
            ctl.select_sort(&key);
        }
    }

    let entries = ctl.listing(kind)?;
    if json {
        let details: Vec<_> = entries.iter().map(|e| &e.detail).collect();
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else if entries.is_empty() {
        println!("No {} found.", kind);
    } else {
        println!("{}:\n", capitalize(&kind.to_string()));
        for entry in &entries {
            println!("  ({}) {}", short_id(&entry.id), entry.summary);
        }
    }

    Ok(())
}

fn handle_get<W: Workspace>(ctl: &mut Controller<W>, kind: W::Kind, id: &str, json: bool) -> Result<()> {
    let id = resolve_id(ctl, kind, id)?;
    ctl.open_modal(ModalKind::View, kind, Some(&id))?;
    let entry = ctl.view()?;
    ctl.close_modal();

    if json {
        println!("{}", serde_json::to_string_pretty(&entry.detail)?);
    } else {
        print_entry(&entry);
    }

    Ok(())
}

fn handle_add<W: Workspace>(ctl: &mut Controller<W>, kind: W::Kind, fields: &[String], json: bool) -> Result<()> {
    ctl.open_modal(ModalKind::Add, kind, None)?;
    for field in fields {
        let (name, value) = split_assignment(field)?;
        ctl.set_field(name, value)?;
    }
    let id = ctl.submit()?;
    finish_write(ctl, kind, &id, json)
}

fn handle_update<W: Workspace>(
    ctl: &mut Controller<W>,
    kind: W::Kind,
    id: &str,
    fields: &[String],
    patch: Option<String>,
    json: bool,
) -> Result<()> {
    let id = resolve_id(ctl, kind, id)?;

    let id = match patch {
        Some(raw) => {
            let patch: Patch = serde_json::from_str(&raw)?;
            ctl.patch(kind, &id, &patch)?
        }
        None if fields.is_empty() => {
            return Err(ValidationError::new("update", "nothing to change; use --set or --patch").into());
        }
        None => {
            ctl.open_modal(ModalKind::Edit, kind, Some(&id))?;
            for field in fields {
                let (name, value) = split_assignment(field)?;
                ctl.set_field(name, value)?;
            }
            ctl.submit()?
        }
    };
    finish_write(ctl, kind, &id, json)
}

fn handle_delete<W: Workspace>(ctl: &mut Controller<W>, kind: W::Kind, id: &str, force: bool) -> Result<()> {
    let id = resolve_id(ctl, kind, id)?;
    ctl.open_modal(ModalKind::Delete, kind, Some(&id))?;

    // Confirm deletion unless --force is used
    if !force {
        let entry = ctl.entry(kind, &id)?;
        eprintln!("Delete ({}) {}? [y/N] ", short_id(&entry.id), entry.summary);

        if atty::is(atty::Stream::Stdin) {
            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            if !input.trim().eq_ignore_ascii_case("y") {
                ctl.close_modal();
                println!("Cancelled.");
                return Ok(());
            }
        } else {
            ctl.close_modal();
            return Err(TrackbookError::Storage(
                "Use --force to delete in non-interactive mode".to_string(),
            ));
        }
    }

    let report = ctl.confirm_delete()?;
    println!("Deleted {} ({})", report.label, short_id(&id));
    if report.cascaded > 0 {
        println!("  also removed {} dependent record(s)", report.cascaded);
    }
    if report.unlinked > 0 {
        println!("  cleared the reference on {} record(s)", report.unlinked);
    }

    Ok(())
}

fn handle_import<W: Workspace>(
    ctl: &mut Controller<W>,
    kind: W::Kind,
    file: Option<PathBuf>,
    format: Option<String>,
    dialect: Option<String>,
    policy: Option<String>,
) -> Result<()> {
    let file = file.filter(|f| f.as_os_str() != "-");
    let text = match &file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    let format = match format {
        Some(raw) => parse_arg::<Format>(&raw)?,
        None => file
            .as_deref()
            .and_then(|p| p.extension())
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .unwrap_or_default(),
    };
    let (current_dialect, current_policy) = ctl.import_settings();
    let dialect = match dialect {
        Some(raw) => parse_arg::<CsvDialect>(&raw)?,
        None => current_dialect,
    };
    let policy = match policy {
        Some(raw) => parse_arg::<ImportPolicy>(&raw)?,
        None => current_policy,
    };
    ctl.set_import_settings(dialect, Some(policy));

    ctl.open_modal(ModalKind::Import, kind, None)?;
    let count = ctl.import(&text, format)?;
    println!("Imported {} {} record(s) ({}, {})", count, kind, format, policy);

    Ok(())
}

fn handle_stats<W: Workspace>(ctl: &Controller<W>, json: bool) -> Result<()> {
    let stats = ctl.dashboard();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{} dashboard:\n", capitalize(&W::APP.to_string()));
        let width = stats.iter().map(|s| s.label.len()).max().unwrap_or(0);
        for stat in &stats {
            println!("  {:width$}  {}", stat.label, stat.value, width = width);
        }
    }
    Ok(())
}

fn handle_theme<W: Workspace>(ctl: &mut Controller<W>, mode: Option<&str>) -> Result<()> {
    let dark = match mode.map(str::to_lowercase).as_deref() {
        None => ctl.dark_mode(),
        Some("dark" | "on") => ctl.set_dark_mode(true)?,
        Some("light" | "off") => ctl.set_dark_mode(false)?,
        Some("toggle") => ctl.toggle_dark_mode()?,
        Some(other) => {
            return Err(ValidationError::new(
                "mode",
                format!("'{}' is not one of dark, light, toggle", other),
            )
            .into())
        }
    };
    println!("{} theme: {}", W::APP, if dark { "dark" } else { "light" });
    Ok(())
}

/// Print queued notices and the saved record.
fn finish_write<W: Workspace>(ctl: &mut Controller<W>, kind: W::Kind, id: &str, json: bool) -> Result<()> {
    let notices = ctl.take_notices();
    let entry = ctl.entry(kind, id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entry.detail)?);
    } else {
        for notice in notices {
            println!("{}", notice);
        }
        println!("  ({}) {}", short_id(&entry.id), entry.summary);
    }
    Ok(())
}

fn print_entry(entry: &Entry) {
    println!("{}", entry.summary);
    if let Some(fields) = entry.detail.as_object() {
        for (name, value) in fields {
            let value = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            println!("  {}: {}", name, value);
        }
    }
}

/// Accept a full id or a unique prefix of one.
fn resolve_id<W: Workspace>(ctl: &Controller<W>, kind: W::Kind, raw: &str) -> Result<String> {
    let entries = ctl.workspace().listing(kind, &Query::new(), &SortState::new())?;
    if entries.iter().any(|e| e.id == raw) {
        return Ok(raw.to_string());
    }
    let mut matches = entries.iter().filter(|e| e.id.starts_with(raw));
    match (matches.next(), matches.next()) {
        (Some(entry), None) => Ok(entry.id.clone()),
        (Some(_), Some(_)) => Err(ValidationError::new("id", format!("'{}' matches more than one record", raw)).into()),
        // let the lookup report it as not found
        (None, _) => Ok(raw.to_string()),
    }
}

fn parse_app(raw: &str) -> Result<AppKind> {
    raw.parse().map_err(TrackbookError::Config)
}

fn parse_kind<W: Workspace>(raw: &str) -> Result<W::Kind> {
    raw.parse().map_err(TrackbookError::InvalidCollection)
}

fn parse_arg<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T> {
    raw.parse().map_err(TrackbookError::Config)
}

fn split_assignment(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim(), v))
        .ok_or_else(|| ValidationError::new("argument", format!("expected name=value, got '{}'", raw)).into())
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("name=Ada").unwrap(), ("name", "Ada"));
        assert_eq!(split_assignment("notes=a=b").unwrap(), ("notes", "a=b"));
        assert!(split_assignment("name").is_err());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("students"), "Students");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_resolve_id_prefix() {
        let ctl: Controller<SchoolWorkspace> =
            Controller::open(Box::new(crate::storage::MemoryBackend::new()));
        let kind = crate::workspace::school::SchoolKind::Student;
        assert_eq!(resolve_id(&ctl, kind, "student-2").unwrap(), "student-2");
        assert!(resolve_id(&ctl, kind, "student-").is_err());
        assert_eq!(resolve_id(&ctl, kind, "ghost").unwrap(), "ghost");
    }
}
