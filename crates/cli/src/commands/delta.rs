use crate::cli::DeltaCommands;
use crate::output;
use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;
use xref_core::backend::{BlameSource, Build, BuildSource, DefSource};
use xref_core::{DeltaEngine, DeltaSpec, RepoRevSpec, Session};

pub fn handle_delta<B>(session: &Session, backend: &B, command: DeltaCommands) -> Result<()>
where
    B: DefSource + BuildSource + BlameSource,
{
    let uri = session
        .repo
        .as_ref()
        .map(|r| r.uri.clone())
        .context("no repository URI; pass --repo")?;

    let range = match &command {
        DeltaCommands::Defs { range, .. }
        | DeltaCommands::Authors { range }
        | DeltaCommands::Clients { range }
        | DeltaCommands::Dependents { range } => range,
    };
    let spec = DeltaSpec {
        base: RepoRevSpec::new(&uri, &range.base),
        head: RepoRevSpec::new(&uri, &range.head),
    };

    let engine = DeltaEngine::new(session, backend, backend, backend);
    let delta = engine.get(&spec)?;
    if session.verbose {
        info!(
            "base: {}@{}, build {}",
            delta.base.uri,
            delta.base.commit_id,
            build_summary(&delta.base_build)
        );
        info!(
            "head: {}@{}, build {}",
            delta.head.uri,
            delta.head.commit_id,
            build_summary(&delta.head_build)
        );
    }

    match command {
        DeltaCommands::Defs { stat, .. } => {
            let delta_defs = engine.list_defs(&delta)?;
            if stat {
                println!(
                    "{}",
                    format!("+ {}", delta_defs.diff_stat.added).green().bold()
                );
                println!(
                    "{}",
                    format!("▲ {}", delta_defs.diff_stat.changed).yellow().bold()
                );
                println!(
                    "{}",
                    format!("- {}", delta_defs.diff_stat.deleted).red().bold()
                );
                println!();
            }
            for dd in &delta_defs.defs {
                if let (true, Some(head)) = (dd.is_added(), dd.head.as_ref()) {
                    println!("{} {}", "+".green().bold(), output::fmt_delta_def(head));
                }
                if let (true, Some(base)) = (dd.is_changed(), dd.base.as_ref()) {
                    println!("{} {}", "▲".yellow().bold(), output::fmt_delta_def(base));
                }
                if let (true, Some(base)) = (dd.is_deleted(), dd.base.as_ref()) {
                    println!("{} {}", "-".red().bold(), output::fmt_delta_def(base));
                }
            }
        }
        DeltaCommands::Authors { .. } => {
            for author in engine.list_affected_authors(&delta)? {
                println!(
                    "{} contributed to the following changed/deleted definitions:",
                    output::fmt_person(&author.person).cyan().bold()
                );
                for def in &author.defs {
                    println!("    {}", output::fmt_delta_def(def));
                }
                println!();
            }
        }
        DeltaCommands::Clients { .. } => {
            for client in engine.list_affected_clients(&delta)? {
                println!(
                    "{} uses {} affected definition(s) at {} site(s):",
                    output::fmt_person(&client.person).cyan().bold(),
                    client.defs.len(),
                    client.ref_count
                );
                for def in &client.defs {
                    println!("    {}", output::fmt_delta_def(def));
                }
                println!();
            }
        }
        DeltaCommands::Dependents { .. } => {
            for dependent in engine.list_affected_dependents(&delta)? {
                println!(
                    "{} references {} affected definition(s) from {} file(s):",
                    dependent.repo.cyan().bold(),
                    dependent.defs.len(),
                    dependent.ref_count
                );
                for def in &dependent.defs {
                    println!("    {}", output::fmt_delta_def(def));
                }
                println!();
            }
        }
    }
    Ok(())
}

fn build_summary(build: &Build) -> String {
    match build.ended_at {
        Some(t) if build.success => format!("{} (finished {})", build.id, output::ago(t)),
        _ => format!("{} (not ready)", build.id),
    }
}
