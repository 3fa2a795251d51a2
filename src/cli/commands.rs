// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Subcommand implementations. Each returns `Err(message)` for `main` to print.

use std::collections::HashSet;
use std::path::Path;

use log::{debug, info, warn};
use serde::Serialize;

use rtdbg::registry::CONTRACT_FIELDS;
use rtdbg::sample::sample_snapshot;
use rtdbg::versioning::declared_bump;
use rtdbg::{
    check_version_bump, diff_manifests, required_bump, ContractConfig, ContractReader,
    ContractVersion, ContractView, FieldKind, LayoutManifest, ObjectInfo, ObjectReader, Probe,
    Snapshot, TargetEncoding, ThreadInfo, ThreadListReader, TypeInfo,
};

use super::display::*;
use super::{Cli, Commands, TargetArgs};

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> Result<(), String> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Dump {
            output,
            target,
            base,
        } => dump(&config, &output, &target, base),
        Commands::Inspect {
            file,
            json,
            objects,
        } => inspect(&config, &file, json, &objects),
        Commands::Lookup {
            file,
            type_name,
            field,
        } => lookup(&config, &file, &type_name, field.as_deref()),
        Commands::Manifest { target, output } => manifest(&config, &target, output.as_deref()),
        Commands::Check {
            old,
            new,
            old_version,
            new_version,
        } => check(&old, &new, old_version, new_version),
    }
}

fn load_config(path: Option<&Path>) -> Result<ContractConfig, String> {
    match path {
        Some(path) => {
            let config = ContractConfig::load(path).map_err(|e| format!("config: {}", e))?;
            debug!("loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(ContractConfig::default()),
    }
}

/// Config target with command-line overrides applied.
fn resolve_target(config: &ContractConfig, args: &TargetArgs) -> TargetEncoding {
    let mut target = config.target;
    if let Some(width) = args.pointer_width {
        target.pointer_width = width.into();
    }
    if let Some(endian) = args.endian {
        target.endianness = endian.into();
    }
    target
}

fn read_snapshot(path: &Path) -> Result<Snapshot, String> {
    Snapshot::read_from_file(path).map_err(|e| format!("{}: {}", path.display(), e))
}

fn read_view(config: &ContractConfig, snapshot: &Snapshot) -> Result<ContractView, String> {
    ContractReader::new()
        .with_limits(config.reader)
        .read(snapshot, snapshot.header_address())
        .map_err(|e| e.to_string())?
        .ok_or_else(|| {
            format!(
                "no contract at {:#x} (cookie mismatch)",
                snapshot.header_address()
            )
        })
}

fn table_kind(type_name: &str, field_name: &str) -> Option<FieldKind> {
    CONTRACT_FIELDS
        .iter()
        .find(|f| f.type_name == type_name && f.field_name == field_name)
        .map(|f| f.kind)
}

// ============================================================================
// DUMP
// ============================================================================

fn dump(
    config: &ContractConfig,
    output: &Path,
    target: &TargetArgs,
    base: Option<u64>,
) -> Result<(), String> {
    let enc = resolve_target(config, target);
    let base = base.unwrap_or(config.base_address);
    let snapshot =
        sample_snapshot(enc, base, config.max_registry_entries).map_err(|e| e.to_string())?;
    let bytes = snapshot.to_bytes().map_err(|e| e.to_string())?;
    snapshot
        .write_to_file(output)
        .map_err(|e| format!("{}: {}", output.display(), e))?;
    info!("wrote {} ({} bytes)", output.display(), bytes.len());

    println!(
        "{} {} contract for {} at {} ({})",
        status(true),
        ContractVersion::CURRENT,
        enc,
        address(snapshot.header_address(), enc.pointer_size()),
        format_size(bytes.len())
    );
    println!("  {}", dim(&format!("→ {}", output.display())));
    Ok(())
}

// ============================================================================
// INSPECT
// ============================================================================

/// One requested object address, decoded or not.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ObjectEntry {
    Decoded(ObjectInfo),
    Unreadable { address: u64, error: String },
}

/// Everything read through the contract beyond the contract itself.
///
/// A snapshot may leave out memory a global points at. Each failure is logged
/// and the rest of the report still prints.
#[derive(Debug, Default)]
struct Decoded {
    objects: Vec<ObjectEntry>,
    free_object_type: Option<TypeInfo>,
    threads: Vec<ThreadInfo>,
}

#[derive(Serialize)]
struct InspectReport<'a> {
    contract: &'a ContractView,
    objects: Vec<ObjectEntry>,
    free_object_type: Option<TypeInfo>,
    threads: Vec<ThreadInfo>,
}

fn decode_targets(view: &ContractView, snapshot: &Snapshot, object_addresses: &[u64]) -> Decoded {
    let mut decoded = Decoded::default();
    match ObjectReader::new(view) {
        Ok(decoder) => {
            for &address in object_addresses {
                let entry = match decoder.read_object(snapshot, address) {
                    Ok(object) => ObjectEntry::Decoded(object),
                    Err(err) => {
                        warn!("object at {:#x} is unreadable: {}", address, err);
                        ObjectEntry::Unreadable {
                            address,
                            error: err.to_string(),
                        }
                    }
                };
                decoded.objects.push(entry);
            }
            if let Some(address) = view.global("g_pFreeObjectEEType") {
                match decoder.read_type(snapshot, address) {
                    Ok(ty) => decoded.free_object_type = Some(ty),
                    Err(err) => warn!("free object type at {:#x} is unreadable: {}", address, err),
                }
            }
        }
        Err(err) => debug!("not decoding objects: {}", err),
    }

    if let Some(runtime) = view.global("g_pTheRuntimeInstance") {
        match ThreadListReader::new(view).and_then(|r| r.read_threads(snapshot, runtime)) {
            Ok(threads) => decoded.threads = threads,
            Err(err) => warn!("thread list from {:#x} is unreadable: {}", runtime, err),
        }
    }
    decoded
}

fn inspect(
    config: &ContractConfig,
    file: &Path,
    json: bool,
    object_addresses: &[u64],
) -> Result<(), String> {
    let snapshot = read_snapshot(file)?;
    let reader = ContractReader::new().with_limits(config.reader);
    let info = match reader
        .probe(&snapshot, snapshot.header_address())
        .map_err(|e| e.to_string())?
    {
        Probe::Present(info) => info,
        Probe::NotPresent { found } => {
            if json {
                println!("{}", serde_json::json!({ "present": false, "found": found }));
            } else {
                println!(
                    "{} no contract: found cookie {} ({})",
                    status(false),
                    found,
                    found.generation().unwrap_or("unknown")
                );
            }
            return Ok(());
        }
    };
    let view = reader
        .read_lists(&snapshot, info)
        .map_err(|e| e.to_string())?;
    let Decoded {
        objects,
        free_object_type,
        threads,
    } = decode_targets(&view, &snapshot, object_addresses);

    if json {
        let report = InspectReport {
            contract: &view,
            objects,
            free_object_type,
            threads,
        };
        let out = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{}", out);
        return Ok(());
    }

    let ptr = view.encoding.pointer_size();
    double_header();
    title(&format!("{} contract {}", view.magic, view.version));
    double_footer();

    section_top("HEADER");
    row(&format!(" address     {}", address(view.header_address, ptr)));
    row(&format!(" encoding    {}", view.encoding));
    row(&format!(" types list  {}", address(view.lists.debug_types_list, ptr)));
    row(&format!(" globals     {}", address(view.lists.globals_list, ptr)));
    row(&format!(
        " entries     {} type, {} global",
        view.types.len(),
        view.globals.len()
    ));

    for type_name in view.type_names() {
        section_mid(type_name);
        for fact in view.fields_of(type_name) {
            // The first fact for a field is the newest; the rest are shadowed
            let shadowed = view
                .fields_of(type_name)
                .find(|f| f.field_name == fact.field_name)
                .is_some_and(|newest| newest.entry_address != fact.entry_address);
            let mut line = format!(
                " {} {} {:>6}",
                pad_right(&kind_badge(table_kind(type_name, &fact.field_name)), 8),
                pad_right(&fact.field_name, 32),
                fact.field_offset
            );
            if shadowed {
                line.push_str(&format!("  {}", dim("(shadowed)")));
            }
            row(&line);
        }
    }

    if !view.globals.is_empty() {
        section_mid("GLOBALS");
        for global in &view.globals {
            row(&format!(
                " {} {}",
                pad_right(&global.name, 41),
                address(global.address, ptr)
            ));
        }
    }

    if !objects.is_empty() || free_object_type.is_some() {
        section_mid("OBJECTS");
        if let Some(ty) = free_object_type {
            row(&format!(
                " free object type {}  base {} component {}",
                address(ty.address, ptr),
                ty.base_size,
                ty.component_size
            ));
        }
        for entry in &objects {
            let object = match entry {
                ObjectEntry::Decoded(object) => object,
                ObjectEntry::Unreadable { address: at, error } => {
                    row(&format!(" {} {}", address(*at, ptr), dim(&format!("unreadable: {}", error))));
                    continue;
                }
            };
            let length = object
                .array_length
                .map(|n| format!(" [{}]", n))
                .unwrap_or_default();
            row(&format!(
                " {} type {}{}  {} bytes  sync {:#010x}",
                address(object.address, ptr),
                address(object.ty.address, ptr),
                length,
                object.size,
                object.sync_block
            ));
        }
    }

    if !threads.is_empty() {
        section_mid("THREADS");
        for thread in &threads {
            row(&format!(
                " {} id {:#x}  alloc {}..{}",
                address(thread.address, ptr),
                thread.thread_id,
                address(thread.alloc_ptr, ptr),
                address(thread.alloc_limit, ptr)
            ));
        }
    }
    section_bot();
    Ok(())
}

// ============================================================================
// LOOKUP
// ============================================================================

fn lookup(
    config: &ContractConfig,
    file: &Path,
    type_name: &str,
    field: Option<&str>,
) -> Result<(), String> {
    let snapshot = read_snapshot(file)?;
    let view = read_view(config, &snapshot)?;
    let ptr = view.encoding.pointer_size();

    if let Some(field) = field {
        let offset = view
            .field(type_name, field)
            .ok_or_else(|| format!("{}.{} is not in the contract", type_name, field))?;
        println!("{}", offset);
        return Ok(());
    }

    let mut seen = HashSet::new();
    for fact in view.fields_of(type_name) {
        if seen.insert(fact.field_name.as_str()) {
            println!("{} {}", pad_right(&fact.field_name, 32), fact.field_offset);
        }
    }
    if seen.is_empty() {
        let address_of = view
            .global(type_name)
            .ok_or_else(|| format!("{} is not in the contract", type_name))?;
        println!("{}", address(address_of, ptr));
    }
    Ok(())
}

// ============================================================================
// MANIFEST / CHECK
// ============================================================================

fn manifest(
    config: &ContractConfig,
    target: &TargetArgs,
    output: Option<&Path>,
) -> Result<(), String> {
    let manifest = LayoutManifest::for_target(resolve_target(config, target));
    match output {
        Some(path) => {
            manifest
                .save(path)
                .map_err(|e| format!("{}: {}", path.display(), e))?;
            println!("{} manifest → {}", status(true), path.display());
        }
        None => println!("{}", manifest.to_json().map_err(|e| e.to_string())?),
    }
    Ok(())
}

fn check(
    old: &Path,
    new: &Path,
    old_version: Option<ContractVersion>,
    new_version: Option<ContractVersion>,
) -> Result<(), String> {
    let old_manifest =
        LayoutManifest::load(old).map_err(|e| format!("{}: {}", old.display(), e))?;
    let new_manifest =
        LayoutManifest::load(new).map_err(|e| format!("{}: {}", new.display(), e))?;
    let old_version = old_version.unwrap_or(old_manifest.version);
    let new_version = new_version.unwrap_or(new_manifest.version);

    let changes = diff_manifests(&old_manifest, &new_manifest);
    for change in &changes {
        println!("  {} {}", pad_right(&bump_label(change.bump()), 6), change);
    }
    if changes.is_empty() {
        println!("  {}", dim("no layout changes"));
    }

    check_version_bump(old_version, new_version, &changes).map_err(|e| e.to_string())?;
    println!(
        "{} {} → {} ({} bump declared, {} required)",
        status(true),
        old_version,
        new_version,
        declared_bump(old_version, new_version)
            .map(bump_label)
            .unwrap_or_default(),
        bump_label(required_bump(&changes))
    );
    Ok(())
}
