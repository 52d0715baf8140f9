use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context as _};
use colored::Colorize;
use frag_convert::{Converted, Converter};
use frag_model::Fragment;
use frag_store::FsFragmentStore;
use frag_types::{FragmentId, MediaType, OwnerId, TypeRegistry};
use serde_json::json;
use tracing::debug;

use crate::cli::*;
use crate::config::FragmentsConfig;

/// Everything a command needs, resolved once from flags and config.
struct Session {
    store: FsFragmentStore,
    registry: TypeRegistry,
    converter: Converter,
    owner: OwnerId,
    format: OutputFormat,
    max_fragment_size: u64,
}

impl Session {
    fn open(owner: &str, format: OutputFormat, config: &FragmentsConfig) -> anyhow::Result<Self> {
        let registry = config.registry()?;
        let store = FsFragmentStore::new(&config.data_dir);
        debug!(root = %store.root().display(), %owner, "opening fragment store");
        Ok(Self {
            store,
            converter: Converter::new(registry.clone()),
            registry,
            owner: OwnerId::parse(owner).context("--owner must not be empty")?,
            format,
            max_fragment_size: config.max_fragment_size,
        })
    }

    fn json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

pub fn run_command(cli: Cli, config: FragmentsConfig) -> anyhow::Result<()> {
    let session = Session::open(&cli.owner, cli.format, &config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dispatch(&session, cli.command))
}

async fn dispatch(session: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Create(args) => cmd_create(session, args).await,
        Command::Update(args) => cmd_update(session, args).await,
        Command::List(args) => cmd_list(session, args).await,
        Command::Info(args) => cmd_info(session, args).await,
        Command::Get(args) => cmd_get(session, args).await,
        Command::Delete(args) => cmd_delete(session, args).await,
        Command::Convert(args) => cmd_convert(session, args),
    }
}

/// Read a payload file, refusing anything over the configured limit.
fn read_payload(path: &Path, limit: u64) -> anyhow::Result<Vec<u8>> {
    let len = std::fs::metadata(path)
        .with_context(|| format!("reading {}", path.display()))?
        .len();
    if len > limit {
        bail!("{} is {len} bytes, over the {limit} byte limit", path.display());
    }
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn write_output(output: Option<&Path>, data: &[u8]) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn parse_id(id: &str) -> anyhow::Result<FragmentId> {
    FragmentId::parse(id).context("fragment id must not be empty")
}

fn print_fragment(fragment: &Fragment, registry: &TypeRegistry) {
    println!("{}", fragment.id().as_str().yellow().bold());
    println!("  Type:    {}", fragment.content_type().cyan());
    println!("  Size:    {} bytes", fragment.size());
    println!("  Created: {}", fragment.created().to_rfc3339());
    println!("  Updated: {}", fragment.updated().to_rfc3339());
    let formats: Vec<String> = fragment
        .formats(registry)
        .into_iter()
        .map(|kind| format!("{kind} (.{})", TypeRegistry::extension_for(kind)))
        .collect();
    println!("  Formats: {}", formats.join(", ").dimmed());
}

async fn cmd_create(session: &Session, args: CreateArgs) -> anyhow::Result<()> {
    let data = read_payload(&args.file, session.max_fragment_size)?;
    let mut fragment = Fragment::create(&session.owner, &args.content_type, &session.registry)?;
    fragment.set_data(&session.store, &data).await?;

    if session.json() {
        println!("{}", serde_json::to_string_pretty(&fragment)?);
    } else {
        println!(
            "{} Created fragment {} ({}, {} bytes)",
            "✓".green().bold(),
            fragment.id().as_str().yellow(),
            fragment.content_type().cyan(),
            fragment.size()
        );
    }
    Ok(())
}

async fn cmd_update(session: &Session, args: UpdateArgs) -> anyhow::Result<()> {
    let data = read_payload(&args.file, session.max_fragment_size)?;
    let id = parse_id(&args.id)?;
    let mut fragment = Fragment::by_id(&session.store, &session.registry, &session.owner, &id).await?;
    fragment
        .update(&session.store, &session.registry, &args.content_type, &data)
        .await?;

    if session.json() {
        println!("{}", serde_json::to_string_pretty(&fragment)?);
    } else {
        println!(
            "{} Updated fragment {} ({}, {} bytes)",
            "✓".green().bold(),
            fragment.id().as_str().yellow(),
            fragment.content_type().cyan(),
            fragment.size()
        );
    }
    Ok(())
}

async fn cmd_list(session: &Session, args: ListArgs) -> anyhow::Result<()> {
    if args.expand {
        let fragments =
            Fragment::by_user_expanded(&session.store, &session.registry, &session.owner).await?;
        if session.json() {
            println!("{}", serde_json::to_string_pretty(&json!({ "fragments": fragments }))?);
        } else if fragments.is_empty() {
            println!("No fragments.");
        } else {
            for fragment in &fragments {
                println!(
                    "{}  {:<24} {:>10}  {}",
                    fragment.id().as_str().yellow(),
                    fragment.content_type().cyan(),
                    fragment.size(),
                    fragment.updated().to_rfc3339().dimmed()
                );
            }
        }
        return Ok(());
    }

    let ids = Fragment::by_user(&session.store, &session.owner).await?;
    if session.json() {
        println!("{}", serde_json::to_string_pretty(&json!({ "fragments": ids }))?);
    } else if ids.is_empty() {
        println!("No fragments.");
    } else {
        for id in &ids {
            println!("{}", id.as_str().yellow());
        }
    }
    Ok(())
}

async fn cmd_info(session: &Session, args: InfoArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.id)?;
    let fragment = Fragment::by_id(&session.store, &session.registry, &session.owner, &id).await?;

    if session.json() {
        let formats: Vec<String> = fragment
            .formats(&session.registry)
            .into_iter()
            .map(|kind| kind.to_string())
            .collect();
        let body = json!({ "fragment": fragment, "formats": formats });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print_fragment(&fragment, &session.registry);
    }
    Ok(())
}

async fn cmd_get(session: &Session, args: GetArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.id)?;
    let fragment = Fragment::by_id(&session.store, &session.registry, &session.owner, &id).await?;

    let rendered = match (&args.ext, &args.to) {
        (Some(ext), _) => {
            fragment
                .convert_to_extension(&session.store, &session.converter, ext)
                .await?
        }
        (None, Some(to)) => {
            let target = MediaType::parse(to).with_context(|| format!("invalid --to {to:?}"))?;
            fragment
                .convert_to(&session.store, &session.converter, &target)
                .await?
        }
        (None, None) => Converted {
            data: fragment.get_data(&session.store).await?,
            media_type: fragment.media_type(),
        },
    };

    write_output(args.output.as_deref(), &rendered.data)?;
    if let Some(path) = &args.output {
        eprintln!(
            "{} Wrote {} bytes of {} to {}",
            "✓".green().bold(),
            rendered.data.len(),
            rendered.media_type.to_string().cyan(),
            path.display()
        );
    }
    Ok(())
}

async fn cmd_delete(session: &Session, args: DeleteArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.id)?;
    Fragment::delete(&session.store, &session.owner, &id).await?;

    if session.json() {
        println!("{}", json!({ "status": "ok", "id": id }));
    } else {
        println!("{} Deleted fragment {}", "✓".green().bold(), id.as_str().yellow());
    }
    Ok(())
}

fn cmd_convert(session: &Session, args: ConvertArgs) -> anyhow::Result<()> {
    let data = read_payload(&args.file, session.max_fragment_size)?;
    let rendered = session.converter.convert_str(&data, &args.from, &args.to)?;
    write_output(args.output.as_deref(), &rendered.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use frag_model::ErrorKind;
    use frag_model::FragmentError;

    fn session(dir: &Path, types: &[&str]) -> Session {
        let config = FragmentsConfig {
            data_dir: dir.join("store"),
            storable_types: types.iter().map(|t| t.to_string()).collect(),
            max_fragment_size: 64,
            ..FragmentsConfig::default()
        };
        Session::open("alice", OutputFormat::Text, &config).unwrap()
    }

    fn fragment_error(err: &anyhow::Error) -> ErrorKind {
        err.downcast_ref::<FragmentError>()
            .map(FragmentError::kind)
            .unwrap_or_else(|| panic!("not a fragment error: {err:#}"))
    }

    #[test]
    fn payload_over_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, vec![b'x'; 65]).unwrap();
        let err = read_payload(&path, 64).unwrap_err();
        assert!(err.to_string().contains("over the 64 byte limit"));

        std::fs::write(&path, vec![b'x'; 64]).unwrap();
        assert_eq!(read_payload(&path, 64).unwrap().len(), 64);
    }

    #[test]
    fn empty_owner_is_rejected() {
        let err = Session::open("", OutputFormat::Text, &FragmentsConfig::default());
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn create_get_convert_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path(), &["text/plain", "text/markdown"]);
        let input = dir.path().join("note.md");
        std::fs::write(&input, "# Hello\nWorld").unwrap();

        cmd_create(&s, CreateArgs { file: input, content_type: "text/markdown".into() })
            .await
            .unwrap();
        let ids = Fragment::by_user(&s.store, &s.owner).await.unwrap();
        assert_eq!(ids.len(), 1);
        let id = ids[0].as_str().to_owned();

        let out = dir.path().join("note.html");
        cmd_get(
            &s,
            GetArgs { id: id.clone(), ext: Some("html".into()), to: None, output: Some(out.clone()) },
        )
        .await
        .unwrap();
        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains("<h1>Hello</h1>"));

        let raw = dir.path().join("note.out");
        cmd_get(&s, GetArgs { id: id.clone(), ext: None, to: None, output: Some(raw.clone()) })
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&raw).unwrap(), "# Hello\nWorld");

        cmd_delete(&s, DeleteArgs { id: id.clone() }).await.unwrap();
        let err = cmd_info(&s, InfoArgs { id }).await.unwrap_err();
        assert_eq!(fragment_error(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn create_rejects_unstorable_type() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path(), &["text/plain"]);
        let input = dir.path().join("data.csv");
        std::fs::write(&input, "a,b\n1,2").unwrap();

        let err = cmd_create(&s, CreateArgs { file: input, content_type: "text/csv".into() })
            .await
            .unwrap_err();
        assert_eq!(fragment_error(&err), ErrorKind::Validation);
        assert!(Fragment::by_user(&s.store, &s.owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_changes_type() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path(), &["text/plain", "text/csv"]);
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.csv");
        std::fs::write(&first, "plain").unwrap();
        std::fs::write(&second, "name,age\nJohn,30").unwrap();

        cmd_create(&s, CreateArgs { file: first, content_type: "text/plain".into() })
            .await
            .unwrap();
        let id = Fragment::by_user(&s.store, &s.owner).await.unwrap()[0].clone();
        cmd_update(
            &s,
            UpdateArgs { id: id.as_str().into(), file: second, content_type: "text/csv".into() },
        )
        .await
        .unwrap();

        let out = dir.path().join("out.json");
        cmd_get(
            &s,
            GetArgs {
                id: id.as_str().into(),
                ext: None,
                to: Some("application/json".into()),
                output: Some(out.clone()),
            },
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), r#"[{"name":"John","age":"30"}]"#);
    }

    #[tokio::test]
    async fn unsupported_target_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path(), &["text/plain"]);
        let input = dir.path().join("a.txt");
        std::fs::write(&input, "plain").unwrap();
        cmd_create(&s, CreateArgs { file: input, content_type: "text/plain".into() })
            .await
            .unwrap();
        let id = Fragment::by_user(&s.store, &s.owner).await.unwrap()[0].clone();

        let err = cmd_get(
            &s,
            GetArgs { id: id.as_str().into(), ext: Some("png".into()), to: None, output: None },
        )
        .await
        .unwrap_err();
        assert_eq!(fragment_error(&err), ErrorKind::UnsupportedConversion);
    }

    #[test]
    fn convert_without_store() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path(), &["text/plain"]);
        let input = dir.path().join("doc.json");
        let output = dir.path().join("doc.yaml");
        std::fs::write(&input, r#"{"name":"John"}"#).unwrap();

        cmd_convert(
            &s,
            ConvertArgs {
                file: input,
                from: "application/json".into(),
                to: "application/yaml".into(),
                output: Some(output.clone()),
            },
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "name: John\n");
    }
}
