use anyhow::Result;
use chitter::cli::{Cli, Commands};
use chitter::pipeline::Collaborators;
use chitter::probe::FfprobeVideoProbe;
use chitter::publish::LocalBlobStore;
use chitter::transcode::FfmpegTranscoder;
use chitter::{ProjectConfig, bundle, pipeline, project, query};
use clap::Parser;
use owo_colors::OwoColorize;
use std::io::Read;
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = cli.root.unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Init { repository_url } => {
            let project = project::init(&root, repository_url.as_deref())?;
            eprintln!(
                "{} project initialized with {} session(s)",
                "ok:".green(),
                project.sessions.len()
            );
        }
        Commands::Add { session_id, all } => {
            if all {
                let added = project::add_all(&root)?;
                for id in &added {
                    eprintln!("{} added {id}", "ok:".green());
                }
                if added.is_empty() {
                    eprintln!("nothing to add");
                }
            } else if let Some(id) = session_id {
                project::add(&root, &id)?;
                eprintln!("{} added {id}", "ok:".green());
            }
        }
        Commands::Update(args) => {
            let opts = args.opts();
            let project_config = ProjectConfig::load(&root)?;
            let transcoder = FfmpegTranscoder::new(project_config.use_sandbox_for_transcode);
            let publisher = LocalBlobStore::new(&root);
            let collab = Collaborators {
                transcoder: &transcoder,
                video_probe: &FfprobeVideoProbe,
                publisher: &publisher,
            };

            let reports = if args.selector.all {
                pipeline::run_all(&root, &opts, &collab)?
            } else if let Some(session) = &args.selector.session {
                vec![pipeline::run_session(&root, session, &opts, &collab)?]
            } else {
                unreachable!("clap enforces the selector group")
            };

            bundle::write_index(&root)?;

            for report in &reports {
                let status = if report.ran.any() {
                    "updated".green().to_string()
                } else {
                    "up to date".to_string()
                };
                eprintln!("{}: {status}", report.session_id);
            }
        }
        Commands::ServeQuery { share_root, dir } => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            let request: serde_json::Value = serde_json::from_str(&input)?;
            let response = query::handle_query(&request, &dir, &share_root)?;
            println!("{}", serde_json::to_string(&response)?);
        }
    }

    Ok(())
}
