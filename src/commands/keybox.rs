use crate::app::AppContext;
use crate::keybox::{self, Keybox, RecordId};
use crate::output::record_view::{record_json, record_summary_json, record_summary_text, record_text};
use crate::{cli, config, exit_codes, output};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

pub fn run(command: cli::Commands, ctx: &AppContext) -> ExitCode {
    match command {
        cli::Commands::Init => init(ctx),
        cli::Commands::Add(args) => add(args, ctx),
        cli::Commands::Get(args) => get(args, ctx),
        cli::Commands::Edit(args) => edit(args, ctx),
        cli::Commands::Rm(args) => rm(args, ctx),
        cli::Commands::List => list(ctx),
        cli::Commands::Find(args) => find(args, ctx),
        cli::Commands::Import(args) => import(args, ctx),
        cli::Commands::Export(args) => export(args, ctx),
        cli::Commands::Passwd => passwd(ctx),
    }
}

fn resolve_path(ctx: &AppContext) -> Result<PathBuf, ExitCode> {
    config::resolve_keybox_path(ctx.path.clone()).map_err(|error| {
        eprintln!("Error: {error}");
        exit_codes::exit_code_for_config_error(&error)
    })
}

fn prompt_open(label: &str) -> Result<SecretString, ExitCode> {
    keybox::prompt_passphrase(label).map_err(|error| {
        eprintln!("Error: {error}");
        exit_codes::exit_code_for_prompt_error(&error)
    })
}

fn prompt_new(label: &str) -> Result<SecretString, ExitCode> {
    keybox::prompt_new_passphrase(label).map_err(|error| {
        eprintln!("Error: {error}");
        exit_codes::exit_code_for_prompt_error(&error)
    })
}

fn open_keybox(path: &std::path::Path) -> Result<(Keybox, SecretString), ExitCode> {
    let passphrase = prompt_open("Master passphrase")?;
    match Keybox::open(path, &passphrase) {
        Ok(kb) => Ok((kb, passphrase)),
        Err(error) => {
            eprintln!("Error: {error}");
            Err(exit_codes::exit_code_for_keybox_error(&error))
        }
    }
}

fn resolve_index(kb: &Keybox, index: usize) -> Result<RecordId, ExitCode> {
    kb.iter().nth(index).map(|(id, _)| id).ok_or_else(|| {
        eprintln!("Error: no record at index {index}");
        ExitCode::from(exit_codes::EXIT_USAGE)
    })
}

fn init(ctx: &AppContext) -> ExitCode {
    let path = match resolve_path(ctx) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let passphrase = match prompt_new("Master passphrase") {
        Ok(pw) => pw,
        Err(code) => return code,
    };

    match Keybox::create(&path, &passphrase, None) {
        Ok(_) => output::print_value(
            path.display().to_string(),
            json!({"kind": "init", "path": path.display().to_string()}),
            &ctx.output_mode,
        ),
        Err(error) => {
            eprintln!("Error: {error}");
            exit_codes::exit_code_for_keybox_error(&error)
        }
    }
}

fn add(args: cli::AddArgs, ctx: &AppContext) -> ExitCode {
    let path = match resolve_path(ctx) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (mut kb, _passphrase) = match open_keybox(&path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let password = match args.password {
        Some(p) => p,
        None => match prompt_new("Password") {
            Ok(pw) => pw.expose_secret().to_string(),
            Err(code) => return code,
        },
    };

    let mut fields: Vec<(&str, &str)> = Vec::new();
    if let Some(site) = &args.site {
        fields.push(("site", site));
    }
    if let Some(user) = &args.user {
        fields.push(("user", user));
    }
    if let Some(url) = &args.url {
        fields.push(("url", url));
    }
    if let Some(tags) = &args.tags {
        fields.push(("tags", tags));
    }
    if let Some(note) = &args.note {
        fields.push(("note", note));
    }
    fields.push(("password", &password));

    let id = match kb.add(&fields) {
        Ok(id) => id,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_keybox_error(&error);
        }
    };

    if let Err(error) = kb.save() {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_keybox_error(&error);
    }

    let index = kb.iter().position(|(rid, _)| rid == id).unwrap_or(0);
    output::print_value(
        format!("Added record {index}"),
        json!({"kind": "add", "index": index}),
        &ctx.output_mode,
    )
}

fn get(args: cli::GetArgs, ctx: &AppContext) -> ExitCode {
    let path = match resolve_path(ctx) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (kb, _passphrase) = match open_keybox(&path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let id = match resolve_index(&kb, args.index) {
        Ok(id) => id,
        Err(code) => return code,
    };
    let record = kb.get(id).expect("resolve_index returned a live id");

    let revealed = if args.reveal {
        match kb.reveal_password(id) {
            Ok(pw) => Some(pw),
            Err(error) => {
                eprintln!("Error: {error}");
                return exit_codes::exit_code_for_keybox_error(&error);
            }
        }
    } else {
        None
    };

    let meta = record_json(args.index, record, revealed.as_deref());
    output::print_value(
        record_text(args.index, record, revealed.as_deref()),
        meta,
        &ctx.output_mode,
    )
}

fn edit(args: cli::EditArgs, ctx: &AppContext) -> ExitCode {
    let path = match resolve_path(ctx) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (mut kb, _passphrase) = match open_keybox(&path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let id = match resolve_index(&kb, args.index) {
        Ok(id) => id,
        Err(code) => return code,
    };

    let mut fields: Vec<(&str, &str)> = Vec::new();
    if let Some(site) = &args.site {
        fields.push(("site", site));
    }
    if let Some(user) = &args.user {
        fields.push(("user", user));
    }
    if let Some(url) = &args.url {
        fields.push(("url", url));
    }
    if let Some(tags) = &args.tags {
        fields.push(("tags", tags));
    }
    if let Some(note) = &args.note {
        fields.push(("note", note));
    }
    if let Some(password) = &args.password {
        fields.push(("password", password));
    }

    if let Err(error) = kb.modify(id, &fields) {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_keybox_error(&error);
    }
    if let Err(error) = kb.save() {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_keybox_error(&error);
    }

    output::print_value(
        format!("Edited record {}", args.index),
        json!({"kind": "edit", "index": args.index}),
        &ctx.output_mode,
    )
}

fn rm(args: cli::RmArgs, ctx: &AppContext) -> ExitCode {
    let path = match resolve_path(ctx) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (mut kb, _passphrase) = match open_keybox(&path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let id = match resolve_index(&kb, args.index) {
        Ok(id) => id,
        Err(code) => return code,
    };

    if let Err(error) = kb.delete(id) {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_keybox_error(&error);
    }
    if let Err(error) = kb.save() {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_keybox_error(&error);
    }

    output::print_value(
        format!("Removed record {}", args.index),
        json!({"kind": "rm", "index": args.index}),
        &ctx.output_mode,
    )
}

fn list(ctx: &AppContext) -> ExitCode {
    let path = match resolve_path(ctx) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (kb, _passphrase) = match open_keybox(&path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let mut text_lines = Vec::new();
    let mut summaries = Vec::new();
    for (index, (_, record)) in kb.iter().enumerate() {
        text_lines.push(record_summary_text(index, record));
        summaries.push(record_summary_json(index, record));
    }
    let meta = json!({
        "kind": "list",
        "count": summaries.len(),
        "records": summaries,
    });

    output::print_value(text_lines.join("\n"), meta, &ctx.output_mode)
}

fn find(args: cli::FindArgs, ctx: &AppContext) -> ExitCode {
    let path = match resolve_path(ctx) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (kb, _passphrase) = match open_keybox(&path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let all_ids: Vec<RecordId> = kb.iter().map(|(id, _)| id).collect();
    let matches = kb.find(&args.query);

    let mut text_lines = Vec::new();
    let mut summaries = Vec::new();
    for (id, record) in &matches {
        let index = all_ids.iter().position(|rid| rid == id).unwrap_or(0);
        text_lines.push(record_summary_text(index, record));
        summaries.push(record_summary_json(index, record));
    }
    let meta = json!({
        "kind": "find",
        "query": args.query,
        "count": matches.len(),
        "records": summaries,
    });

    output::print_value(text_lines.join("\n"), meta, &ctx.output_mode)
}

fn import(args: cli::ImportArgs, ctx: &AppContext) -> ExitCode {
    let path = match resolve_path(ctx) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (mut kb, _passphrase) = match open_keybox(&path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let imported_rows: Vec<Vec<(String, String)>> = if args.format.keybox {
        let other_path = match &args.input {
            Some(path) => path.clone(),
            None => {
                eprintln!("Error: --keybox import requires --input <path>");
                return ExitCode::from(exit_codes::EXIT_USAGE);
            }
        };
        let other_passphrase = match prompt_open("Passphrase for the keybox being imported") {
            Ok(pw) => pw,
            Err(code) => return code,
        };
        let other = match Keybox::open(&other_path, &other_passphrase) {
            Ok(other) => other,
            Err(error) => {
                eprintln!("Error: {error}");
                return exit_codes::exit_code_for_keybox_error(&error);
            }
        };
        let mut rows = Vec::with_capacity(other.len());
        for (id, record) in other.iter() {
            let mut row: Vec<(String, String)> = other
                .header()
                .iter()
                .filter(|col| col.as_str() != "password")
                .map(|col| (col.clone(), record.get(col).to_string()))
                .collect();
            match other.reveal_password(id) {
                Ok(password) if !password.is_empty() => row.push(("password".to_string(), password)),
                Ok(_) => {}
                Err(error) => {
                    eprintln!("Error: {error}");
                    return exit_codes::exit_code_for_keybox_error(&error);
                }
            }
            rows.push(row);
        }
        rows
    } else {
        let text = match read_input(args.input.as_deref()) {
            Ok(text) => text,
            Err(error) => {
                eprintln!("Error: {error}");
                return ExitCode::from(exit_codes::EXIT_GENERIC);
            }
        };

        if args.format.plain {
            match keybox::import_plain(&text) {
                Ok(parsed) => parsed
                    .rows
                    .into_iter()
                    .map(|values| parsed.header.iter().cloned().zip(values).collect())
                    .collect(),
                Err(error) => {
                    eprintln!("Error: {error}");
                    return ExitCode::from(exit_codes::EXIT_FILE_FORMAT);
                }
            }
        } else {
            match keybox::import_json(&text) {
                Ok(parsed) => parsed.rows,
                Err(error) => {
                    eprintln!("Error: {error}");
                    return ExitCode::from(exit_codes::EXIT_FILE_FORMAT);
                }
            }
        }
    };

    let mut imported_count = 0;
    for row in imported_rows {
        let fields: Vec<(&str, &str)> = row
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Err(error) = kb.add(&fields) {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_keybox_error(&error);
        }
        imported_count += 1;
    }

    if let Err(error) = kb.save() {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_keybox_error(&error);
    }

    output::print_value(
        format!("Imported {imported_count} record(s)"),
        json!({"kind": "import", "count": imported_count}),
        &ctx.output_mode,
    )
}

fn export(args: cli::ExportArgs, ctx: &AppContext) -> ExitCode {
    let path = match resolve_path(ctx) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (kb, _passphrase) = match open_keybox(&path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let mut passwords = Vec::new();
    for (index, (id, _)) in kb.iter().enumerate() {
        match kb.reveal_password(id) {
            Ok(pw) if !pw.is_empty() => passwords.push((index, pw)),
            Ok(_) => {}
            Err(error) => {
                eprintln!("Error: {error}");
                return exit_codes::exit_code_for_keybox_error(&error);
            }
        }
    }

    // A throwaway RecordStore mirrors the open keybox's header/records so
    // the export codec (which only knows about RecordStore) can run
    // without reaching into Keybox internals.
    let header = kb.header().to_vec();
    let rows: Vec<Vec<String>> = kb
        .iter()
        .map(|(_, record)| record.ordered_values(&header))
        .collect();
    let mirror = keybox::RecordStore::load_rows(header, rows);

    let mut buf = Vec::new();
    let result = if args.format.plain {
        keybox::export_plain(&mirror, &passwords, &mut buf)
    } else {
        keybox::export_json(&mirror, &passwords, &mut buf)
    };
    if let Err(error) = result {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_plain_json_error(&error);
    }

    if let Some(out_path) = &args.output {
        if let Err(error) = std::fs::write(out_path, &buf) {
            eprintln!("Error: {error}");
            return ExitCode::from(exit_codes::EXIT_GENERIC);
        }
    } else if let Err(error) = std::io::stdout().write_all(&buf) {
        eprintln!("Error: {error}");
        return ExitCode::from(exit_codes::EXIT_GENERIC);
    }

    output::print_value(
        format!("Exported {} record(s)", mirror.len()),
        json!({"kind": "export", "count": mirror.len()}),
        &ctx.output_mode,
    )
}

fn passwd(ctx: &AppContext) -> ExitCode {
    let path = match resolve_path(ctx) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (mut kb, _passphrase) = match open_keybox(&path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let new_passphrase = match prompt_new("New master passphrase") {
        Ok(pw) => pw,
        Err(code) => return code,
    };

    if let Err(error) = kb.change_passphrase(&new_passphrase) {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_keybox_error(&error);
    }

    output::print_value(
        "Master passphrase changed".to_string(),
        json!({"kind": "passwd"}),
        &ctx.output_mode,
    )
}

fn read_input(path: Option<&std::path::Path>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
