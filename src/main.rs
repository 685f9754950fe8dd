use std::env;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use gitscope::config::Config;
use gitscope::error::{GitError, GitResult};
use gitscope::git::{
    ChangeGroup, CliGitExecutor, CommitEntry, DiffDocument, DiffFile, DiffRequest, DiffTarget,
    GitExecutor, GitQueries, GitVersion, LogRequest, RefEntry, RepoContext, RepoLocator,
    StashEntry, StatusEntry,
};
use gitscope::tasks::TaskRunner;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match Config::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Validate git version
    match GitVersion::validate(&config.git.binary) {
        Ok(version) => debug!(%version, "git version accepted"),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    let start_path = env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    });

    // One token fans out to every query; ctrl-c or the deadline cancels them all.
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());
    spawn_deadline(cancel.clone(), Duration::from_secs(config.git.timeout_seconds));

    let executor: Arc<dyn GitExecutor> = Arc::new(CliGitExecutor::new(config.git.binary.clone()));
    let locator = RepoLocator::new(Arc::clone(&executor));
    let queries = Arc::new(GitQueries::new(executor));

    let context = match locator.locate(&start_path, &cancel).await {
        Ok(Some(context)) => context,
        Ok(None) => {
            eprintln!("Not inside a git repository: {}", start_path.display());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = print_snapshot(&config, &queries, context, &cancel).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling queries");
            cancel.cancel();
        }
    });
}

/// Treat the configured timeout as a deadline for the whole snapshot.
fn spawn_deadline(cancel: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!(?timeout, "deadline reached, cancelling queries");
        cancel.cancel();
    });
}

async fn print_snapshot(
    config: &Config,
    queries: &Arc<GitQueries>,
    context: RepoContext,
    cancel: &CancellationToken,
) -> GitResult<()> {
    print_context(&context);

    let entries = queries.status(&context.root, cancel).await?;
    print_status(&entries);

    if !context.dirty.is_clean() {
        let request = DiffRequest {
            root: context.root.clone(),
            target: DiffTarget::WorkingTree,
            path: None,
        };
        let diff = queries.diff(&request, cancel).await?;
        print_worktree_changes(&diff);
    }

    // The listing sections are independent reads; fan them out.
    let runner = TaskRunner::new(config.tasks.max_concurrency);

    let history = if context.head.is_unborn() {
        None
    } else {
        let request = LogRequest {
            root: context.root.clone(),
            reference: None,
            skip: 0,
            take: config.query.log_page_size as usize,
            path: None,
        };
        let queries = Arc::clone(queries);
        let token = cancel.clone();
        Some(spawn_section(&runner, "history", cancel, async move {
            queries.log_page(&request, &token).await
        }))
    };

    let refs = {
        let queries = Arc::clone(queries);
        let root = context.root.clone();
        let token = cancel.clone();
        spawn_section(&runner, "refs", cancel, async move {
            queries.refs(&root, &token).await
        })
    };

    let stashes = {
        let queries = Arc::clone(queries);
        let root = context.root.clone();
        let token = cancel.clone();
        spawn_section(&runner, "stashes", cancel, async move {
            queries.stashes(&root, &token).await
        })
    };

    println!();
    println!("Recent commits");
    match history {
        None => println!("  (no commits yet)"),
        Some(rx) => match recv_section(rx).await {
            Ok(commits) if commits.is_empty() => println!("  (none)"),
            Ok(commits) => print_history(&commits),
            Err(e) => print_section_failure("history", &e),
        },
    }

    println!();
    println!("Refs");
    match recv_section(refs).await {
        Ok(refs) if refs.is_empty() => println!("  (none)"),
        Ok(refs) => print_refs(&refs),
        Err(e) => print_section_failure("refs", &e),
    }

    println!();
    println!("Stashes");
    match recv_section(stashes).await {
        Ok(stashes) if stashes.is_empty() => println!("  (none)"),
        Ok(stashes) => print_stashes(&stashes),
        Err(e) => print_section_failure("stashes", &e),
    }

    if cancel.is_cancelled() {
        return Err(GitError::Cancelled);
    }
    Ok(())
}

/// Run one listing query in the background, delivering its result over a
/// oneshot channel. A task abandoned by cancellation drops the sender.
fn spawn_section<T, F>(
    runner: &TaskRunner,
    title: &str,
    cancel: &CancellationToken,
    query: F,
) -> oneshot::Receiver<GitResult<T>>
where
    T: Send + 'static,
    F: Future<Output = GitResult<T>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    runner.spawn(title, cancel, move |_progress| async move {
        let _ = tx.send(query.await);
    });
    rx
}

async fn recv_section<T>(rx: oneshot::Receiver<GitResult<T>>) -> GitResult<T> {
    match rx.await {
        Ok(result) => result,
        Err(_) => Err(GitError::Cancelled),
    }
}

/// A failed section degrades to a note; the rest of the snapshot stands.
fn print_section_failure(section: &str, error: &GitError) {
    let summary = error.to_string();
    let first_line = summary.lines().next().unwrap_or("unknown error");
    warn!(section, error = %summary, "section unavailable");
    println!("  (unavailable: {})", first_line);
}

fn print_context(context: &RepoContext) {
    println!("Repository {}", context.root.display());
    if context.is_bare {
        println!("  bare repository");
    }

    let head = &context.head;
    if head.detached {
        println!("  HEAD detached at {}", short_hash(&head.commit_hash));
    } else if head.is_unborn() {
        println!("  On branch {} (no commits yet)", head.ref_name);
    } else {
        println!(
            "  On branch {} at {}",
            head.ref_name,
            short_hash(&head.commit_hash)
        );
    }

    if let Some(upstream) = &context.upstream {
        println!(
            "  Tracking {} (ahead {}, behind {})",
            upstream.name, upstream.ahead, upstream.behind
        );
    }

    let dirty = &context.dirty;
    if dirty.is_clean() {
        println!("  Working tree clean");
    } else {
        println!(
            "  Pending: {} staged, {} unstaged, {} untracked, {} conflicts",
            dirty.staged, dirty.unstaged, dirty.untracked, dirty.conflicts
        );
    }
}

fn print_status(entries: &[StatusEntry]) {
    const GROUPS: [(ChangeGroup, &str); 5] = [
        (ChangeGroup::Conflicts, "Conflicts"),
        (ChangeGroup::Staged, "Staged"),
        (ChangeGroup::Unstaged, "Unstaged"),
        (ChangeGroup::Untracked, "Untracked"),
        (ChangeGroup::Ignored, "Ignored"),
    ];

    for (group, label) in GROUPS {
        let grouped: Vec<&StatusEntry> = entries.iter().filter(|e| e.group == group).collect();
        if grouped.is_empty() {
            continue;
        }

        println!();
        println!("{}", label);
        for entry in grouped {
            let mut line = format!("  {} {}", entry.code, entry.path);
            if let Some(original) = &entry.original_path {
                line.push_str(&format!(" (from {})", original));
            }
            if entry.submodule {
                line.push_str(" (submodule)");
            }
            println!("{}", line);
        }
    }
}

fn print_worktree_changes(diff: &DiffDocument) {
    if diff.is_empty() {
        return;
    }

    println!();
    println!("Working tree changes");
    for file in &diff.files {
        match file.stats {
            Some(stats) => println!(
                "  {} (+{} -{})",
                display_path(file),
                stats.added,
                stats.deleted
            ),
            None => println!("  {}", display_path(file)),
        }
    }
}

fn display_path(file: &DiffFile) -> String {
    if file.old_path == file.new_path {
        file.new_path.clone()
    } else {
        format!("{} -> {}", file.old_path, file.new_path)
    }
}

fn print_history(commits: &[CommitEntry]) {
    for commit in commits {
        let mut line = format!(
            "  {} {} {}",
            short_hash(&commit.hash),
            commit.date.format("%Y-%m-%d"),
            commit.subject
        );
        if !commit.decorations.is_empty() {
            line.push_str(&format!(" ({})", commit.decorations.join(", ")));
        }
        println!("{}", line);
    }
}

fn print_refs(refs: &[RefEntry]) {
    for entry in refs {
        let mut line = format!("  {} {}", short_hash(&entry.hash), entry.name);
        if let Some(upstream) = &entry.upstream {
            line.push_str(&format!(" -> {}", upstream));
            if let (Some(ahead), Some(behind)) = (entry.ahead, entry.behind) {
                line.push_str(&format!(" [+{} -{}]", ahead, behind));
            }
        }
        println!("{}", line);
    }
}

fn print_stashes(stashes: &[StashEntry]) {
    for stash in stashes {
        println!(
            "  {} {} {}",
            stash.name,
            stash.date.format("%Y-%m-%d"),
            stash.message
        );
    }
}

fn short_hash(hash: &str) -> &str {
    if hash.len() > 7 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        &hash[..7]
    } else {
        hash
    }
}
