use std::collections::BTreeMap;
use std::str::FromStr;
use clap::{App, AppSettings, Arg, ArgMatches};
use serde::Serialize;
use authz::Sid;
use ldapdir::{Directory, MemoryDirectory};
use admc::{policy, trustee, AceColumn, AcePermission, AdmcError, GplinkOption, PermissionState, Schema, SecurityModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Csv,
    Json,
}

#[derive(Serialize)]
struct LinkRow {
    reference: String,
    enforced: bool,
    disabled: bool,
}

#[derive(Serialize)]
struct TrusteeRow {
    sid: Sid,
    name: String,
    permissions: BTreeMap<AcePermission, PermissionState>,
}

fn load_snapshot(path: &str) -> Result<MemoryDirectory, AdmcError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| AdmcError::SnapshotFile { path: path.to_owned(), reason: e.to_string() })?;
    Ok(MemoryDirectory::from_json(&json)?)
}

fn save_snapshot(dir: &MemoryDirectory, path: &str) -> Result<(), AdmcError> {
    let json = dir.to_json()?;
    std::fs::write(path, json)
        .map_err(|e| AdmcError::SnapshotFile { path: path.to_owned(), reason: e.to_string() })?;
    log::info!("Saved directory snapshot to {}", path);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AdmcError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| AdmcError::Output(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn print_table(format: OutputFormat, headers: &[&str], rows: &[Vec<String>]) -> Result<(), AdmcError> {
    if format == OutputFormat::Csv {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        writer.write_record(headers).map_err(|e| AdmcError::Output(e.to_string()))?;
        for row in rows {
            writer.write_record(row).map_err(|e| AdmcError::Output(e.to_string()))?;
        }
        writer.flush().map_err(|e| AdmcError::Output(e.to_string()))?;
        return Ok(());
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }
    let format_row = |cells: Vec<&str>| -> String {
        cells.iter().zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<String>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };
    println!("{}", format_row(headers.to_vec()));
    for row in rows {
        println!("{}", format_row(row.iter().map(|s| s.as_str()).collect()));
    }
    Ok(())
}

fn report_change(changed: bool, what: &str) {
    if changed {
        println!("{}", what);
    } else {
        println!("Nothing to change");
    }
}

fn parse_bool(args: &ArgMatches, name: &str) -> Option<bool> {
    args.value_of(name).map(|v| v == "true")
}

fn run_gplink(args: &ArgMatches, dir: &mut MemoryDirectory, format: OutputFormat) -> Result<bool, AdmcError> {
    match args.subcommand() {
        Some(("show", sub)) => {
            let dn = sub.value_of("dn").unwrap_or_default();
            let gplink = policy::get_gplink(dir, dn)?;
            let rows: Vec<LinkRow> = gplink.entries().map(|e| LinkRow {
                reference: e.reference.clone(),
                enforced: e.has_option(GplinkOption::Enforced),
                disabled: e.has_option(GplinkOption::Disabled),
            }).collect();
            if format == OutputFormat::Json {
                print_json(&rows)?;
            } else {
                let rows: Vec<Vec<String>> = rows.iter().enumerate()
                    .map(|(i, r)| vec![(i + 1).to_string(), r.reference.clone(), r.enforced.to_string(), r.disabled.to_string()])
                    .collect();
                print_table(format, &["order", "policy", "enforced", "disabled"], &rows)?;
            }
            Ok(false)
        },
        Some(("links", sub)) => {
            let gpo = sub.value_of("gpo").unwrap_or_default();
            let base = dir.get_default_naming_context().to_owned();
            let links = policy::find_linked_objects(dir, &base, gpo)?;
            if format == OutputFormat::Json {
                print_json(&links)?;
            } else {
                let rows: Vec<Vec<String>> = links.iter()
                    .map(|l| vec![l.name.clone(), l.dn.clone(), l.enforced.to_string(), l.disabled.to_string()])
                    .collect();
                print_table(format, &["name", "dn", "enforced", "disabled"], &rows)?;
            }
            Ok(false)
        },
        Some(("block-inheritance", sub)) => {
            let dn = sub.value_of("dn").unwrap_or_default();
            match parse_bool(sub, "value") {
                Some(block) => {
                    let changed = policy::set_block_inheritance(dir, dn, block)?;
                    report_change(changed, &format!("Inheritance {} on {}", if block { "blocked" } else { "restored" }, dn));
                    Ok(changed)
                },
                None => {
                    println!("{}", policy::get_block_inheritance(dir, dn)?);
                    Ok(false)
                },
            }
        },
        Some((action, sub)) => {
            let dn = sub.value_of("dn").unwrap_or_default();
            let gpo = sub.value_of("gpo").unwrap_or_default();
            let changed = match action {
                "add" => policy::link_gpo(dir, dn, gpo)?,
                "remove" => policy::unlink_gpo(dir, dn, gpo)?,
                "move-up" => policy::move_link_up(dir, dn, gpo)?,
                "move-down" => policy::move_link_down(dir, dn, gpo)?,
                "set-option" => {
                    let option = GplinkOption::from_str(sub.value_of("option").unwrap_or_default())
                        .map_err(AdmcError::Output)?;
                    let value = parse_bool(sub, "value").unwrap_or(false);
                    policy::set_link_option(dir, dn, gpo, option, value)?
                },
                _ => false,
            };
            report_change(changed, &format!("Updated gPLink of {}", dn));
            Ok(changed)
        },
        None => Ok(false),
    }
}

#[derive(Serialize)]
struct AceRow {
    kind: String,
    trustee: String,
    mask: String,
    object_type: String,
    inherited: bool,
    inherit_only: bool,
}

// Every ACE of the DACL, including those no permission accounts for
fn show_raw_aces(model: &SecurityModel, dir: &MemoryDirectory, schema: &Schema, format: OutputFormat) -> Result<(), AdmcError> {
    let rows: Vec<AceRow> = model.descriptor().dacl_aces().iter().map(|ace| AceRow {
        kind: if ace.grants_access() {
            "Allow"
        } else if ace.denies_access() {
            "Deny"
        } else {
            "Other"
        }.to_owned(),
        trustee: ace.get_trustee().map(|t| trustee::resolve_trustee_name(dir, t)).unwrap_or_default(),
        mask: ace.get_mask().map(|m| format!("0x{:X}", m)).unwrap_or_default(),
        object_type: ace.get_object_type().map(|g| schema.describe_object_type(g)).unwrap_or_default(),
        inherited: ace.is_inherited(),
        inherit_only: ace.is_inherit_only(),
    }).collect();
    if format == OutputFormat::Json {
        return print_json(&rows);
    }
    let table: Vec<Vec<String>> = rows.into_iter()
        .map(|r| vec![r.kind, r.trustee, r.mask, r.object_type, r.inherited.to_string(), r.inherit_only.to_string()])
        .collect();
    print_table(format, &["type", "trustee", "mask", "object type", "inherited", "inherit only"], &table)
}

fn show_security(model: &SecurityModel, dir: &MemoryDirectory, only: Option<&Sid>, format: OutputFormat) -> Result<(), AdmcError> {
    if let Some(ace) = model.descriptor().dacl.as_ref().and_then(|acl| acl.get_non_canonical_ace()) {
        eprintln!(" [!] ACL is not in canonical order, e.g. this ACE is out of order: {}", ace);
    }
    let mut rows: Vec<TrusteeRow> = model.trustees().iter()
        .filter(|t| only.map(|o| o == *t).unwrap_or(true))
        .map(|t| TrusteeRow {
            sid: t.clone(),
            name: trustee::resolve_trustee_name(dir, t),
            permissions: model.get_table(t).map(|table| table.iter().collect()).unwrap_or_default(),
        })
        .collect();
    rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    if let Some(sid) = only {
        if rows.is_empty() {
            return Err(AdmcError::UnknownTrustee(sid.clone()));
        }
    }

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Csv => {
            let mut table = Vec::new();
            for row in &rows {
                for p in AcePermission::all() {
                    let state = model.get_state(&row.sid, *p);
                    table.push(vec![row.sid.to_string(), row.name.clone(), p.to_string(), state.to_string()]);
                }
            }
            print_table(format, &["sid", "name", "permission", "state"], &table)
        },
        OutputFormat::Text => {
            for row in &rows {
                println!("Permissions for {} ({})", row.name, row.sid);
                let table: Vec<Vec<String>> = AcePermission::all().iter().map(|p| {
                    let state = model.get_state(&row.sid, *p);
                    vec![
                        format!("  {}", p),
                        if state == PermissionState::Allowed { "[x]" } else { "[ ]" }.to_owned(),
                        if state == PermissionState::Denied { "[x]" } else { "[ ]" }.to_owned(),
                    ]
                }).collect();
                print_table(format, &["", "Allowed", "Denied"], &table)?;
                println!();
            }
            Ok(())
        },
    }
}

fn run_security(args: &ArgMatches, dir: &mut MemoryDirectory, format: OutputFormat) -> Result<bool, AdmcError> {
    let (action, sub) = match args.subcommand() {
        Some(s) => s,
        None => return Ok(false),
    };
    if action == "well-known-trustees" {
        let rows: Vec<Vec<String>> = trustee::well_known_trustees().into_iter()
            .map(|(sid, name)| vec![sid.to_string(), name.to_owned()])
            .collect();
        print_table(format, &["sid", "name"], &rows)?;
        return Ok(false);
    }
    let dn = sub.value_of("dn").unwrap_or_default();
    let schema = Schema::query(dir)?;
    let mut model = SecurityModel::load(dir, dn, &schema)?;
    let trustee = sub.value_of("trustee").map(Sid::from_str).transpose()?;

    match action {
        "show" => {
            if sub.is_present("raw") {
                show_raw_aces(&model, dir, &schema, format)?;
            } else {
                show_security(&model, dir, trustee.as_ref(), format)?;
            }
            return Ok(false);
        },
        "set" | "add-trustee" => {
            let trustee = trustee.ok_or_else(|| AdmcError::Output("a trustee is required".to_owned()))?;
            let permission = AcePermission::from_str(sub.value_of("permission").unwrap_or_default())?;
            let column = AceColumn::from_str(sub.value_of("column").unwrap_or("allowed")).map_err(AdmcError::Output)?;
            if action == "add-trustee" {
                model.add_trustee(&trustee);
            }
            model.toggle(&trustee, permission, column, !sub.is_present("unchecked"))?;
        },
        "remove-trustee" => {
            let trustee = trustee.ok_or_else(|| AdmcError::Output("a trustee is required".to_owned()))?;
            if !model.remove_trustee(&trustee) {
                return Err(AdmcError::UnknownTrustee(trustee));
            }
        },
        _ => return Ok(false),
    }

    if !model.is_modified() {
        println!("Nothing to change");
        return Ok(false);
    }
    model.apply(dir, dn)?;
    println!("Updated security descriptor of {}", dn);
    Ok(true)
}

fn main() {
    let dn_arg = || Arg::new("dn")
        .help("Distinguished name of the target object")
        .required(true)
        .index(1);
    let gpo_arg = || Arg::new("gpo")
        .help("Distinguished name of the group policy object")
        .required(true)
        .index(2);
    let trustee_arg = |index: usize| Arg::new("trustee")
        .help("SID of the trustee, e.g. S-1-5-11")
        .required(true)
        .index(index);

    let app = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::new("snapshot")
                .help("JSON snapshot of the directory to work on")
                .long("snapshot")
                .short('f')
                .value_name("FILE")
                .takes_value(true)
        ).arg(
            Arg::new("verbose")
                .help("Log more details (repeat for debug output)")
                .long("verbose")
                .short('v')
                .multiple_occurrences(true)
        ).arg(
            Arg::new("csv")
                .help("Format output as CSV")
                .long("csv")
                .conflicts_with("json")
        ).arg(
            Arg::new("json")
                .help("Format output as JSON")
                .long("json")
        ).subcommand(
            App::new("gplink")
                .about("Manage group policy links")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(App::new("show").about("List policies linked to an object").arg(dn_arg()))
                .subcommand(App::new("add").about("Link a policy to an object").arg(dn_arg()).arg(gpo_arg()))
                .subcommand(App::new("remove").about("Unlink a policy from an object").arg(dn_arg()).arg(gpo_arg()))
                .subcommand(App::new("move-up").about("Swap a link with the one before it").arg(dn_arg()).arg(gpo_arg()))
                .subcommand(App::new("move-down").about("Swap a link with the one after it").arg(dn_arg()).arg(gpo_arg()))
                .subcommand(
                    App::new("set-option")
                        .about("Enforce or disable a link")
                        .arg(dn_arg())
                        .arg(gpo_arg())
                        .arg(Arg::new("option").long("option").takes_value(true).required(true).possible_values(&["enforced", "disabled"]))
                        .arg(Arg::new("value").long("value").takes_value(true).required(true).possible_values(&["true", "false"]))
                )
                .subcommand(
                    App::new("links")
                        .about("List objects linked to a policy")
                        .arg(Arg::new("gpo").help("Distinguished name of the group policy object").required(true).index(1))
                )
                .subcommand(
                    App::new("block-inheritance")
                        .about("Show or change whether an object blocks inherited policies")
                        .arg(dn_arg())
                        .arg(Arg::new("value").long("value").takes_value(true).possible_values(&["true", "false"]))
                )
        ).subcommand(
            App::new("security")
                .about("Manage object permissions")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    App::new("show")
                        .about("Show the permissions of each trustee")
                        .arg(dn_arg())
                        .arg(Arg::new("trustee").long("trustee").takes_value(true))
                        .arg(Arg::new("raw").long("raw").help("List ACEs as stored instead of permissions"))
                )
                .subcommand(
                    App::new("set")
                        .about("Check or uncheck a permission for a trustee")
                        .arg(dn_arg())
                        .arg(Arg::new("trustee").long("trustee").takes_value(true).required(true))
                        .arg(Arg::new("permission").long("permission").takes_value(true).required(true))
                        .arg(Arg::new("column").long("column").takes_value(true).default_value("allowed").possible_values(&["allowed", "denied"]))
                        .arg(Arg::new("unchecked").long("unchecked"))
                )
                .subcommand(
                    App::new("add-trustee")
                        .about("Add a trustee with an initial permission")
                        .arg(dn_arg())
                        .arg(trustee_arg(2))
                        .arg(Arg::new("permission").long("permission").takes_value(true).default_value("Read"))
                        .arg(Arg::new("column").long("column").takes_value(true).default_value("allowed").possible_values(&["allowed", "denied"]))
                )
                .subcommand(App::new("well-known-trustees").about("List trustees which exist in every domain"))
                .subcommand(
                    App::new("remove-trustee")
                        .about("Remove every permission of a trustee")
                        .arg(dn_arg())
                        .arg(trustee_arg(2))
                )
        );

    let args = app.get_matches();

    let level = match args.occurrences_of("verbose") {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let format = if args.is_present("json") {
        OutputFormat::Json
    } else if args.is_present("csv") {
        OutputFormat::Csv
    } else {
        OutputFormat::Text
    };

    let snapshot_path = match args.value_of("snapshot") {
        Some(p) => p,
        None => {
            eprintln!(" [!] No directory snapshot given, use --snapshot FILE");
            std::process::exit(1);
        }
    };
    let mut dir = match load_snapshot(snapshot_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!(" [!] Unable to load directory snapshot: {}", e);
            std::process::exit(1);
        }
    };

    let res = match args.subcommand() {
        Some(("gplink", sub)) => run_gplink(sub, &mut dir, format),
        Some(("security", sub)) => run_security(sub, &mut dir, format),
        _ => Ok(false),
    };

    // The snapshot is only rewritten once the directory accepted the change
    match res {
        Ok(true) => {
            if let Err(e) = save_snapshot(&dir, snapshot_path) {
                eprintln!(" [!] {}", e);
                std::process::exit(1);
            }
        },
        Ok(false) => (),
        Err(e) => {
            eprintln!(" [!] {}", e);
            std::process::exit(1);
        }
    }
}
