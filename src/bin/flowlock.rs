use clap::{Parser, Subcommand};
use async_trait::async_trait;
use flowlock::participants::Participant;
use flowlock::runtime::nid::Nid;
use flowlock::runtime::blueprint::Tree;
use flowlock::runtime::engine::{Engine, EngineConfig};
use flowlock::runtime::redis_storage::{RedisExpressionStore, RedisMutexStore, RedisStateStore, RedisTaskQueue};
use flowlock::runtime::workitem::Workitem;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::Result;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run concurrent branches contending for one mutex and print the admission order
    Run {
        /// Number of contending branches
        #[arg(long, short, default_value_t = 3)]
        branches: usize,

        /// Mutex name ("m0" local, "/m0" process, "//m0" engine-wide)
        #[arg(long, short, default_value = "m0")]
        mutex: String,

        /// Time each branch spends inside the reserved section
        #[arg(long, default_value_t = 100)]
        work_ms: u64,

        /// Number of engine workers
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Keep process state in Redis instead of memory
        #[arg(long)]
        redis: Option<String>,
    },
}

/// Sleeps inside the reserved section and records when each branch was inside.
#[derive(Debug)]
struct Turnstile {
    work: Duration,
    origin: Instant,
    visits: Mutex<Vec<(String, Duration, Duration)>>,
}

#[async_trait]
impl Participant for Turnstile {
    fn name(&self) -> &str {
        "work"
    }

    async fn consume(&self, nid: &Nid, workitem: Workitem) -> Result<Option<Workitem>> {
        let entered = self.origin.elapsed();
        tokio::time::sleep(self.work).await;
        let left = self.origin.elapsed();
        self.visits.lock().await.push((nid.expr_id.clone(), entered, left));
        Ok(Some(workitem))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { branches, mutex, work_ms, workers, timeout_secs, redis } => {
            let config = EngineConfig {
                workers,
                ..EngineConfig::default()
            };

            let mut engine = match redis {
                Some(url) => {
                    info!("Using Redis: {}", url);
                    let client = redis::Client::open(url)?;
                    Engine::new_with_storage(
                        Arc::new(RedisStateStore::new(client.clone())),
                        Arc::new(RedisMutexStore::new(client.clone())),
                        Arc::new(RedisExpressionStore::new(client.clone())),
                        Arc::new(RedisTaskQueue::new(client, "flowlock:tasks".to_string())),
                        config,
                    )
                }
                None => Engine::with_config(config),
            };
            let turnstile = Arc::new(Turnstile {
                work: Duration::from_millis(work_ms),
                origin: Instant::now(),
                visits: Mutex::new(Vec::new()),
            });
            engine.register_participant(turnstile.clone());

            let tree = Tree::concurrence(
                (0..branches)
                    .map(|_| Tree::reserve(&mutex, Tree::participant("work")))
                    .collect(),
            );

            let engine = Arc::new(engine);
            let handles = engine.spawn_workers();

            let instance_id = engine.launch(tree, Workitem::new(), HashMap::new()).await?;
            info!("Launched {} branches on mutex {:?}: {}", branches, mutex, instance_id);

            let result = engine.wait_for(instance_id, Duration::from_secs(timeout_secs)).await;
            for h in handles {
                h.abort();
            }

            result?;

            let visits = turnstile.visits.lock().await;
            let mut overlaps = 0;
            for (i, (nid, entered, left)) in visits.iter().enumerate() {
                println!("{:>3}. {:<10} {:>8.3}s .. {:>8.3}s", i + 1, nid, entered.as_secs_f64(), left.as_secs_f64());
                if i > 0 && *entered < visits[i - 1].2 {
                    overlaps += 1;
                }
            }
            println!("{} branches, {} overlapping sections", visits.len(), overlaps);
        }
    }

    Ok(())
}
