use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use ion_association::{AssociationInstance, AssociationManager};
use ion_protocol::Container;
use ion_repository::{CheckoutOptions, ObjectHandle, Repository, DEFAULT_BRANCH};
use ion_schema::{TypeRegistry, Value};
use ion_store::StructureElement;
use ion_types::well_known::PREDICATE;
use ion_workbench::{LocalTransport, Workbench, WorkbenchConfig};

use crate::cli::*;
use crate::schema::{self, ADDRESS_BOOK, PERSON};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => WorkbenchConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WorkbenchConfig::default(),
    };
    match cli.command {
        Command::Demo(args) => cmd_demo(args, config),
        Command::Inspect(args) => cmd_inspect(args),
        Command::Log(args) => cmd_log(args, config),
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn cmd_demo(args: DemoArgs, config: WorkbenchConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(demo(args, config))
}

async fn demo(args: DemoArgs, config: WorkbenchConfig) -> anyhow::Result<()> {
    let registry = schema::registry()?;
    let transport = LocalTransport::new();
    let alpha = transport
        .attach(Workbench::new("alpha", Arc::clone(&registry), config.clone()))
        .await;
    let beta = transport.attach(Workbench::new("beta", registry, config)).await;

    // alpha creates the book and pushes it
    let key = {
        let mut a = alpha.lock().await;
        let key = a.create_repository(Some(ADDRESS_BOOK), Some("addressbook"))?;
        let repo = a.repository_mut(key.as_str())?;
        let root = repo.root_object()?;
        repo.set(&root, "title", "Contacts")?;
        let owner = repo.create_object(PERSON)?;
        repo.set(&owner, "name", args.owner.as_str())?;
        repo.set_link(&root, "owner", &owner)?;
        let commit = repo.commit("create address book")?;
        println!(
            "{} alpha committed {} to {}",
            "✓".green().bold(),
            commit.short_hex().yellow(),
            key.short_id().cyan()
        );

        let pushed = a.push("beta", &[key.as_str()]).await?;
        println!(
            "{} pushed {} elements ({} bytes) to {}",
            "✓".green().bold(),
            pushed.elements_sent,
            pushed.bytes_transferred,
            "beta".bold()
        );
        key
    };

    // beta reads it and adds a contact
    {
        let mut b = beta.lock().await;
        let root = b
            .checkout(key.as_str(), DEFAULT_BRANCH, CheckoutOptions::default(), Some("alpha"))
            .await?;
        let repo = b.repository_mut(key.as_str())?;
        println!("\n{}", "beta checked out:".bold());
        print_book(repo, &root)?;

        let friend = repo.create_object(PERSON)?;
        repo.set(&friend, "name", "Michael")?;
        repo.push_link(&root, "person", &friend)?;
        let commit = repo.commit("add Michael")?;
        println!("{} beta committed {}", "✓".green().bold(), commit.short_hex().yellow());
    }

    // alpha pulls the change back
    let mut a = alpha.lock().await;
    let pulled = a.pull("beta", key.as_str()).await?;
    for (branch, update) in &pulled.branches {
        println!("  {} {:?}", branch.to_string().yellow(), update);
    }
    let root = a
        .checkout(key.as_str(), DEFAULT_BRANCH, CheckoutOptions::default(), Some("beta"))
        .await?;
    println!("\n{}", "alpha after pull:".bold());
    print_book(a.repository_mut(key.as_str())?, &root)?;

    let owner = a.create_repository(Some(PERSON), None)?;
    let repo = a.repository_mut(owner.as_str())?;
    let person = repo.root_object()?;
    repo.set(&person, "name", args.owner.as_str())?;
    repo.commit("owner")?;
    let predicate = a.create_repository(Some(PREDICATE), None)?;
    let repo = a.repository_mut(predicate.as_str())?;
    let word = repo.root_object()?;
    repo.set(&word, "word", "owns")?;
    repo.commit("predicate")?;

    let association =
        AssociationInstance::create(&mut a, owner.as_str(), predicate.as_str(), key.as_str())?;
    let mut associations = AssociationManager::new();
    associations.name_predicate("owns", predicate.as_str());
    associations.add(association)?;
    println!(
        "\n{} {} association(s) under {}",
        "✓".green().bold(),
        associations
            .get_associations_by_predicate_name("owns")
            .map_or(0, |set| set.len()),
        "owns".yellow()
    );

    if let Some(path) = &args.out {
        let bytes = a.export_repository(key.as_str())?;
        std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        println!("{} wrote {} ({} bytes)", "✓".green().bold(), path.display(), bytes.len());
    }
    drop(a);

    transport.detach("alpha").await;
    transport.detach("beta").await;
    Ok(())
}

fn text(value: Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn print_book(repo: &mut Repository, root: &ObjectHandle) -> anyhow::Result<()> {
    println!("  Title: {}", text(repo.get(root, "title")?).bold());
    if let Some(owner) = repo.get_object(root, "owner")? {
        println!("  Owner: {}", text(repo.get(&owner, "name")?));
    }
    for i in 0..repo.field_len(root, "person")? {
        if let Some(person) = repo.get_object_at(root, "person", i)? {
            println!("  Person: {}", text(repo.get(&person, "name")?));
        }
    }
    Ok(())
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn type_name(registry: &TypeRegistry, element: &StructureElement) -> String {
    registry
        .get(&element.object_type)
        .map(|schema| schema.name().to_string())
        .unwrap_or_else(|_| element.object_type.to_string())
}

fn print_element(role: &str, registry: &TypeRegistry, element: &StructureElement) {
    println!(
        "  {:<5} {}  {:<14} {:>6} bytes{}",
        role,
        element.key.short_hex().yellow(),
        type_name(registry, element),
        element.value.len(),
        if element.isleaf { "  leaf".dimmed().to_string() } else { String::new() }
    );
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let registry = schema::registry()?;
    let container = Container::from_bytes(&read_file(&args.file)?)?;
    println!(
        "{} {} head(s), {} item(s)",
        args.file.display().to_string().bold(),
        container.heads.len(),
        container.items.len()
    );
    for element in container.head_elements()? {
        print_element("head", &registry, &element);
    }
    for element in container.item_elements()? {
        print_element("item", &registry, &element);
    }
    Ok(())
}

fn cmd_log(args: LogArgs, config: WorkbenchConfig) -> anyhow::Result<()> {
    let mut wb = Workbench::new("ionrepo", schema::registry()?, config);
    let received = wb.import_repository(&read_file(&args.file)?)?;
    let repo = wb.repository_mut(received.repository_key.as_str())?;
    println!("Repository {}", received.repository_key.to_string().cyan());
    for (branch, nickname) in repo.branch_names() {
        let name = nickname.unwrap_or_else(|| branch.to_string());
        println!("\nBranch {}", name.yellow().bold());
        for (key, commit) in repo.log(branch.as_str(), Some(args.limit))? {
            println!("  {}  {}", key.short_hex().yellow(), commit.summary());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_output_can_be_inspected_and_logged() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("book.ion");
        cmd_demo(
            DemoArgs {
                owner: "Ann".into(),
                out: Some(out.clone()),
            },
            WorkbenchConfig::default(),
        )
        .unwrap();
        assert!(out.exists());

        cmd_inspect(InspectArgs { file: out.clone() }).unwrap();
        cmd_log(
            LogArgs {
                file: out.clone(),
                limit: 5,
            },
            WorkbenchConfig::default(),
        )
        .unwrap();

        let mut wb = Workbench::new("check", schema::registry().unwrap(), WorkbenchConfig::default());
        let received = wb.import_repository(&std::fs::read(&out).unwrap()).unwrap();
        let repo = wb.repository_mut(received.repository_key.as_str()).unwrap();
        let history = repo.log(DEFAULT_BRANCH, None).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].1.comment, "add Michael");
    }

    #[test]
    fn missing_files_are_reported_with_their_path() {
        let err = cmd_inspect(InspectArgs {
            file: "/nonexistent/book.ion".into(),
        })
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/book.ion"));
    }
}
