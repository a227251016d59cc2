use anyhow::anyhow;
use clap::Parser;
use const_format::concatcp;
use rand::seq::SliceRandom;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::process::{self, Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const LOCAL_PORT: u32 = 8374;
const LOCAL_URL: &str = concatcp!("http://127.0.0.1:", LOCAL_PORT);

#[rustfmt::skip]
const ROCKET_ENV: &[(&str, &str)] = &[
    ("ROCKET_PORT", concatcp!(LOCAL_PORT)),
];

#[rustfmt::skip]
const PLACES: &[(&str, &str)] = &[
    ("shinhung-house", "신흥동 일본식 가옥"),
    ("gyeongam-railroad", "경암동 철길마을"),
    ("eunpa-lake", "은파호수공원"),
    ("modern-history-museum", "군산근대역사박물관"),
    ("dongguk-temple", "동국사"),
    ("leesungdang-bakery", "이성당"),
    ("seonyudo", "선유도"),
    ("saemangeum-seawall", "새만금방조제"),
];

#[derive(Parser)]
struct Args {
    /// Silence local server logging.
    #[arg(short, long)]
    quiet: bool,

    /// Send local server logging to this file; takes precedence over --quiet.
    #[arg(long)]
    logfile: Option<String>,

    /// Run the local server over in-memory storage instead of MongoDB.
    #[arg(long)]
    memory: bool,

    /// Connect to a remote server at this URL instead of running a local one.
    #[arg(long)]
    remote: Option<String>,

    /// How many threads to use. Defaults to the number of logical CPUs.
    #[arg(long, default_value_t = num_cpus::get())]
    threads: usize,

    /// How many likes each thread sends.
    #[arg(long, default_value_t = 200)]
    iterations: usize,
}

/// Construct a URL from segments.
macro_rules! url {
    ($($segment:expr),+) => {{
        std::path::PathBuf::from_iter([$($segment),+]).to_str().unwrap()
    }}
}

/// A favorite record as the server returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Favorite {
    place_id: String,
    likes: u64,
}

/// Set up everything we need before starting the server.
fn setup_deps(memory: bool) -> anyhow::Result<()> {
    // Ensure the optimised build is up-to-date.
    Command::new("cargo")
        .args(["build", "--release"])
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("server build exited nonzero"))?;

    if memory {
        env::set_var("ROCKET_STORE_BACKEND", "memory");
    } else if env::var("ROCKET_DB_URI").is_err() && env::var("MONGO_URL").is_err() {
        return Err(anyhow!(
            "set ROCKET_DB_URI (or MONGO_URL), or pass --memory"
        ));
    } else {
        // Start from an empty leaderboard.
        let random: u32 = rand::random();
        env::set_var("ROCKET_DB_NAME", format!("bench{random}"));
    }

    for (var, val) in ROCKET_ENV {
        env::set_var(var, val);
    }

    Ok(())
}

/// Terminate the given child process. This is a SIGTERM on unix and a hard-kill on other
/// platforms.
fn terminate_child(child: &mut Child) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let pid = nix::unistd::Pid::from_raw(child.id() as i32);
        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM)?;
    }
    #[cfg(not(unix))]
    {
        child.kill()?;
    }
    Ok(())
}

/// Start the server and wait until it answers.
fn launch_server(logfile: Stdio) -> anyhow::Result<Child> {
    let mut proc = Command::new("./target/release/portfolio-backend")
        .stdout(logfile)
        .spawn()?;

    let client = Client::new();
    loop {
        let resp = client
            .get(url!(LOCAL_URL, "health"))
            .send()
            .and_then(Response::error_for_status);

        if resp.is_ok() {
            break;
        }

        // Check the server didn't exit.
        if let Some(retcode) = proc.try_wait()? {
            return Err(anyhow!("Server exited prematurely with code {}", retcode));
        }
        thread::sleep(Duration::from_millis(50));
    }

    Ok(proc)
}

/// Fetch the current like count of every place.
fn like_counts(url: &str) -> anyhow::Result<HashMap<String, u64>> {
    let favorites: Vec<Favorite> = Client::new()
        .get(url!(url, "favorites"))
        .send()
        .and_then(Response::error_for_status)?
        .json()?;
    Ok(favorites
        .into_iter()
        .map(|f| (f.place_id, f.likes))
        .collect())
}

/// Send `iterations` likes for random places; return how many went to each
/// place and the total time spent waiting on the server.
fn send_likes(url: &str, iterations: usize) -> anyhow::Result<(HashMap<String, u64>, Duration)> {
    let client = Client::new();
    let mut sent = HashMap::new();
    let mut waiting = Duration::ZERO;

    for _ in 0..iterations {
        let (id, name) = PLACES
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| anyhow!("no places to like"))?;
        let start = Instant::now();
        client
            .post(url!(url, "favorites"))
            .json(&json!({ "placeId": id, "placeName": name }))
            .send()
            .and_then(Response::error_for_status)?;
        waiting += start.elapsed();
        *sent.entry(id.to_string()).or_insert(0) += 1;
    }

    Ok((sent, waiting))
}

/// Run the benchmark, then check that no like was lost.
fn benchmark(url: &str, num_threads: usize, iterations: usize) -> anyhow::Result<()> {
    let before = like_counts(url)?;
    let total = num_threads * iterations;

    let start = Instant::now();
    let (sent, waiting) = thread::scope(|s| {
        let threads: Vec<_> = (0..num_threads)
            .map(|_| s.spawn(move || send_likes(url, iterations)))
            .collect();

        let mut sent = HashMap::<String, u64>::new();
        let mut waiting = Duration::ZERO;
        for t in threads {
            let (thread_sent, thread_waiting) = t.join().expect("thread panicked")?;
            for (id, n) in thread_sent {
                *sent.entry(id).or_insert(0) += n;
            }
            waiting += thread_waiting;
        }
        Ok::<_, anyhow::Error>((sent, waiting))
    })?;
    let total_duration = start.elapsed();

    let avg = waiting / total as u32;
    println!("like: {:?} ({:.2}/s)", avg, num_threads as f64 / avg.as_secs_f64());
    println!(
        "actual duration: {} likes in {:?} ({:.2}/s)",
        total,
        total_duration,
        total as f64 / total_duration.as_secs_f64()
    );

    // Every like must be accounted for.
    let after = like_counts(url)?;
    let mut lost = 0;
    for (id, n) in &sent {
        let expected = before.get(id).copied().unwrap_or(0) + n;
        let actual = after.get(id).copied().unwrap_or(0);
        if actual != expected {
            println!("{id}: expected {expected} likes, found {actual}");
            lost += expected.abs_diff(actual);
        }
    }
    if lost > 0 {
        return Err(anyhow!("{lost} like(s) lost or duplicated"));
    }
    println!("verified: all {total} likes recorded");

    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let url = args.remote.as_deref().unwrap_or(LOCAL_URL);

    // If we're not connecting remotely, bring up a local server.
    let mut proc: Option<Child> = None;
    if args.remote.is_none() {
        setup_deps(args.memory)?;
        let logfile = match args.logfile {
            Some(path) => Stdio::from(File::create(path)?),
            None => {
                if args.quiet {
                    Stdio::null()
                } else {
                    Stdio::inherit()
                }
            }
        };
        proc = Some(launch_server(logfile)?);
    }

    let result = benchmark(url, args.threads, args.iterations);

    // Kill the server.
    if let Some(p) = proc.as_mut() {
        terminate_child(p)?;
        p.wait()?;
    }

    result
}

fn main() {
    if let Err(e) = run() {
        eprintln!("FATAL: {}", e);
        process::exit(1);
    }
}
