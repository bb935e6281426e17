use std::io;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::debug;
use parcel_core::{TransactionError, TransactionFlags};
use parcel_lock::global_token;
use parcel_registry::RepositoryRegistry;
use parcel_resolver::GraphResolver;
use parcel_transaction::{LocalActionFactory, PackageBackend};

use crate::completion::write_completions_script;
use crate::config::{Settings, ACCEPTED_EULAS_ENV};
use crate::render::{current_output_style, TerminalRenderer};
use crate::{Cli, Commands, TransactionArgs};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        return write_completions_script(shell, &mut io::stdout().lock());
    }

    let settings = Settings::resolve(cli.config.as_deref())?;
    debug!(
        "config {} with state root {}",
        settings.config_path.display(),
        settings.state_root.display()
    );
    let backend = open_backend(&settings)?;
    let env_licenses = std::env::var(ACCEPTED_EULAS_ENV).ok();
    let accepted = |args: &TransactionArgs| {
        settings.accepted_licenses(&args.accept_license, env_licenses.as_deref())
    };
    let mut renderer = TerminalRenderer::new(current_output_style(cli.json));

    let outcome = match cli.command {
        Commands::Install {
            packages,
            transaction,
            only_download,
        } => {
            let flags = TransactionFlags {
                only_download,
                ..transaction_flags(&transaction)
            };
            backend.install(&packages, flags, &accepted(&transaction), &mut renderer)
        }
        Commands::Update {
            packages,
            transaction,
        } => backend.update(
            &packages,
            transaction_flags(&transaction),
            &accepted(&transaction),
            &mut renderer,
        ),
        Commands::Remove {
            packages,
            transaction,
            allow_deps,
            auto_remove,
        } => {
            let flags = TransactionFlags {
                allow_dependencies: allow_deps,
                auto_remove,
                ..transaction_flags(&transaction)
            };
            backend.remove(&packages, flags, &mut renderer)
        }
        Commands::Download {
            packages,
            dest,
            transaction,
        } => {
            std::fs::create_dir_all(&dest)
                .with_context(|| format!("failed to create {}", dest.display()))?;
            backend.download(
                &packages,
                &dest,
                transaction_flags(&transaction),
                &accepted(&transaction),
                &mut renderer,
            )
        }
        Commands::Refresh { force } => backend.refresh(force, &mut renderer),
        Commands::DependsOn {
            packages,
            recursive,
        } => backend
            .depends_on(&packages, recursive, &mut renderer)
            .map(drop),
        Commands::RequiredBy {
            packages,
            recursive,
        } => backend
            .required_by(&packages, recursive, &mut renderer)
            .map(drop),
        Commands::Search { needle } => backend.search(&needle, &mut renderer).map(drop),
        Commands::Updates { packages } => backend.get_updates(&packages, &mut renderer).map(drop),
        Commands::Details { packages } => backend.get_details(&packages, &mut renderer).map(drop),
        Commands::Repos => backend.get_repo_list(&mut renderer).map(drop),
        Commands::Completions { .. } => Ok(()),
    };
    renderer.finish();
    outcome.map_err(transaction_failure)
}

pub(crate) fn open_backend(settings: &Settings) -> Result<PackageBackend> {
    let registry = Arc::new(RepositoryRegistry::open_fs(
        &settings.state_root,
        &settings.config.repositories,
    )?);
    let resolver =
        GraphResolver::new(registry.clone()).with_vital(settings.config.vital.iter().cloned());
    let factory = LocalActionFactory::new(registry.clone(), &settings.state_root);
    Ok(
        PackageBackend::new(registry, Arc::new(resolver), Arc::new(factory))
            .with_cancellation(global_token()),
    )
}

/// Interrupts are honored between actions.
pub(crate) fn transaction_flags(args: &TransactionArgs) -> TransactionFlags {
    TransactionFlags {
        simulate: args.simulate,
        only_trusted: args.only_trusted,
        allow_cancel: true,
        ..TransactionFlags::default()
    }
}

pub(crate) fn transaction_failure(err: TransactionError) -> anyhow::Error {
    anyhow!("{err} [{}]", err.exit_status())
}
