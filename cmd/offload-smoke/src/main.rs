//! Offload End-to-End Smoke Test
//!
//! Drives the full stack on one thread:
//!   Part A: Pool registry: named pools, duplicate and missing names
//!   Part B: Single offload: suspend, resume, elapsed-time variable
//!   Part C: Load: K blocking requests on M workers plus a trivial request
//!   Part D: Backpressure: saturated queue rejects, context stays INIT
//!   Part E: Teardown: request finalized while its task is running
//!
//! Run: OFFLOAD_LOG_LEVEL=info ./target/release/offload-smoke
//! Tunables: OFFLOAD_POOL_THREADS, OFFLOAD_SLEEP_STEP_MS, OFFLOAD_SMOKE_REQUESTS

use offload_core::{env_get, OffloadError, OffloadState, Status};
use offload_executor::{CompletionDispatcher, DriverConfig, OffloadHandler, Outcome, Pipeline};
use offload_module::{delay_for_seed, PoolConfig, PoolRegistry};

use std::time::{Duration, Instant};

// ── Test harness ──

struct TestRunner {
    total: usize,
    passed: usize,
    failed: usize,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl TestRunner {
    fn new() -> Self {
        Self { total: 0, passed: 0, failed: 0 }
    }

    fn section(&self, name: &str) {
        println!("\n{}", LINE);
        println!("  {}", name);
        println!("{}", LINE);
    }

    fn pass(&mut self, name: &str) {
        self.total += 1;
        self.passed += 1;
        println!("  [{:2}] {:<52} PASS", self.total, name);
    }

    fn fail(&mut self, name: &str, reason: &str) {
        self.total += 1;
        self.failed += 1;
        println!("  [{:2}] {:<52} FAIL: {}", self.total, name, reason);
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        if ok { self.pass(name); } else { self.fail(name, reason); }
    }

    fn summary(&self) {
        println!("\n{}", LINE);
        println!(
            "  Total: {}  Passed: {}  Failed: {}",
            self.total, self.passed, self.failed
        );
        println!("{}", LINE);
    }
}

/// Pipeline with one offload phase bound to registry pool `pool`.
fn build_pipeline(
    registry: &PoolRegistry,
    pool: &str,
    config: &DriverConfig,
) -> Result<Pipeline, OffloadError> {
    let dispatcher = CompletionDispatcher::new()?;
    let handler = OffloadHandler::from_registry(registry, pool, dispatcher.sink(), config)?;
    let mut pipeline = Pipeline::new(config.clone(), dispatcher)?;
    pipeline.add_phase("offload", handler);
    Ok(pipeline)
}

fn deadline(step: Duration, rounds: u32) -> Instant {
    Instant::now() + step * 9 * rounds + Duration::from_secs(2)
}

// ════════════════════════════════════════════════════════════
// Part A: Pool registry
// ════════════════════════════════════════════════════════════

fn test_registry(t: &mut TestRunner, registry: &mut PoolRegistry, pool: &PoolConfig) {
    t.section("Part A: Pool registry");

    match registry.add(pool) {
        Ok(p) => t.pass(&format!("add thread_pool {} threads={}", pool.name, p.stats().total)),
        Err(e) => t.fail("add thread_pool", &e.to_string()),
    }

    let dup = registry.add(pool);
    t.check("duplicate name rejected", dup.is_err(), "second add succeeded");

    let tiny = PoolConfig::new().name("tiny").threads(1).max_queue(1);
    t.check("add thread_pool tiny", registry.add(&tiny).is_ok(), "add failed");

    let missing = registry.get("missing").err();
    t.check(
        "missing pool is PoolUnavailable",
        missing == Some(OffloadError::PoolUnavailable),
        &format!("{:?}", missing),
    );
}

// ════════════════════════════════════════════════════════════
// Part B: Single offload
// ════════════════════════════════════════════════════════════

fn test_single(t: &mut TestRunner, registry: &PoolRegistry, pool: &str, config: &DriverConfig) {
    t.section("Part B: Single offload");

    let mut p = match build_pipeline(registry, pool, config) {
        Ok(p) => p,
        Err(e) => return t.fail("build pipeline", &e.to_string()),
    };

    let id = p.begin(format!("{}/one?seed=4", config.location.trim_end_matches('/')));
    let first = p.run(id);
    t.check("first run suspends", first == Ok(Outcome::Suspended), &format!("{:?}", first));

    let state = p.request(id).and_then(|r| r.offload_state());
    t.check(
        "context is PROCESSING while in flight",
        state == Some(OffloadState::Processing),
        &format!("{:?}", state),
    );

    let idle = p.run_until_idle(deadline(config.sleep_step, 1));
    t.check("completion observed", idle == Ok(true), &format!("{:?}", idle));

    let finished = p.request(id).and_then(|r| r.finished());
    t.check("request finished 200", finished == Some(Status::OK), &format!("{:?}", finished));

    let expect = delay_for_seed(4, config.sleep_step).as_millis().to_string();
    let value = p.variable(id, &config.variable).ok().flatten();
    t.check(
        &format!("${} == {}", config.variable, expect),
        value.as_deref() == Some(expect.as_str()),
        &format!("{:?}", value),
    );

    let again = p.resume(id);
    let value2 = p.variable(id, &config.variable).ok().flatten();
    t.check(
        "second resume is a no-op",
        again == Ok(Outcome::Finished(Status::OK)) && value2 == value && p.stats().resumed == 1,
        &format!("{:?} {:?} {:?}", again, value2, p.stats()),
    );
}

// ════════════════════════════════════════════════════════════
// Part C: Load
// ════════════════════════════════════════════════════════════

fn test_load(
    t: &mut TestRunner,
    registry: &PoolRegistry,
    pool: &str,
    config: &DriverConfig,
    requests: usize,
) {
    t.section("Part C: Load");

    let threads = match registry.get(pool) {
        Ok(p) => p.stats().total,
        Err(e) => return t.fail("lookup pool", &e.to_string()),
    };
    let mut p = match build_pipeline(registry, pool, config) {
        Ok(p) => p,
        Err(e) => return t.fail("build pipeline", &e.to_string()),
    };
    println!("       K={} requests on M={} workers", requests, threads);

    let base = config.location.trim_end_matches('/');
    let start = Instant::now();
    let mut ids = Vec::with_capacity(requests);
    for i in 0..requests {
        let id = p.begin(format!("{}/load?seed={}", base, i));
        let _ = p.run(id);
        ids.push(id);
    }

    // A request outside the offload location must not wait for the pool.
    let probe_start = Instant::now();
    let probe = p.begin("/");
    let outcome = p.run(probe);
    let probe_rtt = probe_start.elapsed();
    t.check(
        "trivial request finishes mid-run",
        outcome == Ok(Outcome::Finished(Status::OK)) && probe_rtt < Duration::from_millis(50),
        &format!("{:?} in {:?}", outcome, probe_rtt),
    );

    let rounds = ((requests + threads - 1) / threads) as u32;
    let idle = p.run_until_idle(deadline(config.sleep_step, rounds));
    let elapsed = start.elapsed();
    t.check("all requests completed", idle == Ok(true), &format!("{:?}", idle));

    let done = ids
        .iter()
        .filter(|id| p.request(**id).and_then(|r| r.offload_state()) == Some(OffloadState::Done))
        .count();
    t.check(&format!("{} / {} DONE", done, requests), done == requests, "missing completions");

    let bound = config.sleep_step * 9 * rounds;
    t.check(
        &format!("wall clock {:?} <= ceil(K/M) x max", elapsed),
        elapsed <= bound + Duration::from_millis(500),
        &format!("bound {:?}", bound),
    );

    let stats = p.stats();
    t.check(
        "each request resumed exactly once",
        stats.resumed == requests as u64 && stats.submitted == requests as u64,
        &format!("{:?}", stats),
    );
}

// ════════════════════════════════════════════════════════════
// Part D: Backpressure
// ════════════════════════════════════════════════════════════

fn test_backpressure(t: &mut TestRunner, registry: &PoolRegistry, config: &DriverConfig) {
    t.section("Part D: Backpressure (thread_pool tiny, threads=1 max_queue=1)");

    let mut p = match build_pipeline(registry, "tiny", config) {
        Ok(p) => p,
        Err(e) => return t.fail("build pipeline", &e.to_string()),
    };
    let base = config.location.trim_end_matches('/');

    let running = p.begin(format!("{}/a?seed=2", base));
    let _ = p.run(running);
    // Let the worker take the first task so the queue slot is free again.
    let until = Instant::now() + Duration::from_secs(2);
    while registry.get("tiny").map(|pool| pool.stats().active).unwrap_or(0) == 0
        && Instant::now() < until
    {
        std::thread::sleep(Duration::from_millis(1));
    }
    let queued = p.begin(format!("{}/b?seed=0", base));
    let _ = p.run(queued);

    let rejected = p.begin(format!("{}/c?seed=0", base));
    let outcome = p.run(rejected);
    t.check(
        "saturated pool returns 500",
        outcome == Ok(Outcome::Finished(Status::INTERNAL_SERVER_ERROR)),
        &format!("{:?}", outcome),
    );
    let state = p.request(rejected).and_then(|r| r.offload_state());
    t.check(
        "rejected context stays INIT",
        state == Some(OffloadState::Init),
        &format!("{:?}", state),
    );
    t.check("rejection counted", p.stats().rejected == 1, &format!("{:?}", p.stats()));

    let _ = p.run_until_idle(deadline(config.sleep_step, 3));
}

// ════════════════════════════════════════════════════════════
// Part E: Teardown mid-flight
// ════════════════════════════════════════════════════════════

fn test_teardown(t: &mut TestRunner, registry: &PoolRegistry, pool: &str, config: &DriverConfig) {
    t.section("Part E: Teardown mid-flight");

    let mut p = match build_pipeline(registry, pool, config) {
        Ok(p) => p,
        Err(e) => return t.fail("build pipeline", &e.to_string()),
    };
    let base = config.location.trim_end_matches('/');

    let id = p.begin(format!("{}/gone?seed=3", base));
    let _ = p.run(id);
    let fin = p.finalize(id);
    t.check("finalize while PROCESSING", fin.is_ok(), &format!("{:?}", fin));
    t.check("entry held open by outstanding work", p.contains(id), "entry removed early");
    t.check("request no longer visible", p.request(id).is_none(), "still live");

    let idle = p.run_until_idle(deadline(config.sleep_step, 1));
    t.check("late completion observed", idle == Ok(true), &format!("{:?}", idle));
    t.check("entry released", !p.contains(id), "entry still present");
    let stats = p.stats();
    t.check(
        "late completion discarded, not resumed",
        stats.discarded == 1 && stats.resumed == 0,
        &format!("{:?}", stats),
    );
}

fn main() {
    println!("=== Offload End-to-End Smoke Test ===");

    let pool_config = PoolConfig::from_env();
    let mut config = DriverConfig::from_env();
    // The trivial-request probe needs a target outside the offload location.
    if config.location == "/" {
        config.location = "/sleep".to_string();
    }
    let requests: usize = env_get("OFFLOAD_SMOKE_REQUESTS", 16);

    if let Err(e) = pool_config.validate() {
        println!("\nFATAL: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = config.validate() {
        println!("\nFATAL: {}", e);
        std::process::exit(1);
    }
    pool_config.print();
    config.print();

    let mut t = TestRunner::new();
    let mut registry = PoolRegistry::new();

    test_registry(&mut t, &mut registry, &pool_config);
    test_single(&mut t, &registry, &pool_config.name, &config);
    test_load(&mut t, &registry, &pool_config.name, &config, requests);
    test_backpressure(&mut t, &registry, &config);
    test_teardown(&mut t, &registry, &pool_config.name, &config);

    registry.shutdown_all();

    t.summary();
    std::process::exit(if t.failed > 0 { 1 } else { 0 });
}
