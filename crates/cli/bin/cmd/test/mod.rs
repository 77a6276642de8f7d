use super::RpcOpts;
use alloy_primitives::Address;
use ante_harness::{
    CheckResult, CheckRunner, FailureKind, HarnessConfig, HarnessError, Stage, SuiteResult,
};
use ante_ledger::RpcLedger;
use clap::Parser;
use eyre::{Context, Result};
use figment::{
    Metadata, Profile, Provider,
    value::{Dict, Map, Value},
};
use regex::Regex;
use std::path::PathBuf;
use yansi::Paint;

pub use summary::{format_result, summary_table};

/// CLI arguments for `ante test`.
#[derive(Clone, Debug, Parser)]
#[command(next_help_heading = "Test options")]
pub struct TestArgs {
    /// Path to the config file.
    #[arg(long, short, default_value = HarnessConfig::FILE_NAME, value_name = "PATH")]
    pub config: PathBuf,

    /// The config profile to use.
    ///
    /// Defaults to `ANTE_PROFILE`, then to `default`.
    #[arg(long, short = 'P', value_name = "PROFILE")]
    pub profile: Option<String>,

    #[command(flatten)]
    pub rpc: RpcOpts,

    /// The account that deploys and primes the checks.
    ///
    /// Defaults to the first account the node manages.
    #[arg(long, value_name = "ADDRESS")]
    pub sender: Option<Address>,

    /// Only run checks whose name matches the regex.
    #[arg(long = "match-check", short = 'm', value_name = "REGEX")]
    pub pattern: Option<Regex>,

    /// Print the results as JSON.
    #[arg(long, short)]
    pub json: bool,

    /// Print a summary table after the run.
    #[arg(long, conflicts_with = "json")]
    pub summary: bool,

    /// Exit with code 0 even if a check fails.
    #[arg(long, env = "ANTE_ALLOW_FAILURE")]
    pub allow_failure: bool,
}

impl TestArgs {
    /// Loads the config file and layers the command line overrides on top of it.
    pub fn load_config(&self) -> Result<HarnessConfig> {
        let figment = HarnessConfig::figment(&self.config, self.profile.as_deref()).merge(self);
        HarnessConfig::from_figment(&figment, &self.config)
            .wrap_err_with(|| format!("failed to load {}", self.config.display()))
    }

    pub async fn run(self) -> Result<TestOutcome> {
        let config = self.load_config()?;
        let mut checks = config.load_checks()?;
        if let Some(pattern) = &self.pattern {
            checks.retain(|check| pattern.is_match(&check.name));
        }
        if checks.is_empty() {
            if !self.json {
                println!("{}", "No checks to run".yellow());
            }
            return Ok(TestOutcome::new(SuiteResult::default(), self.allow_failure));
        }

        let ledger = RpcLedger::connect_http(&config.rpc_url)?;
        let mut runner = CheckRunner::new(&ledger, &config).await?;
        if !self.json {
            println!(
                "Running {} check{} against {} from {}",
                checks.len(),
                if checks.len() == 1 { "" } else { "s" },
                ledger.endpoint(),
                runner.sender()
            );
        }

        let outcome = TestOutcome::from_run(runner.run_suite(&checks).await, self.allow_failure)?;
        let suite = &outcome.suite;
        if self.json {
            println!("{}", serde_json::to_string(suite)?);
        } else {
            for result in &suite.results {
                println!("{}", format_result(result));
            }
            println!();
            println!("{}", summary_line(suite));
            if self.summary {
                println!("\n{}", summary_table(suite));
            }
        }

        Ok(outcome)
    }
}

impl Provider for TestArgs {
    fn metadata(&self) -> Metadata {
        Metadata::named("ante test arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        let mut dict = Dict::new();
        if let Some(url) = &self.rpc.url {
            dict.insert("rpc_url".to_string(), Value::from(url.clone()));
        }
        if let Some(sender) = self.sender {
            dict.insert("sender".to_string(), Value::from(sender.to_string()));
        }
        Ok(Map::from([(Profile::Global, dict)]))
    }
}

/// The result of `ante test`.
#[derive(Debug)]
pub struct TestOutcome {
    pub suite: SuiteResult,
    pub allow_failure: bool,
    /// The fatal error that stopped the suite early, if any.
    pub aborted: Option<HarnessError>,
}

impl TestOutcome {
    pub fn new(suite: SuiteResult, allow_failure: bool) -> Self {
        Self { suite, allow_failure, aborted: None }
    }

    /// Builds the outcome of a suite run.
    ///
    /// A suite aborted by a fatal error still reports the checks that finished, followed by a
    /// failure for the check that was interrupted.
    pub fn from_run(run: ante_harness::Result<SuiteResult>, allow_failure: bool) -> Result<Self> {
        match run {
            Ok(suite) => Ok(Self::new(suite, allow_failure)),
            Err(HarnessError::Aborted { check, mut completed, source }) => {
                completed.push(CheckResult::fail(
                    check.clone(),
                    Stage::Init,
                    FailureKind::Execution,
                    source.to_string(),
                ));
                let duration = completed.iter().map(|result| result.duration).sum();
                Ok(Self {
                    suite: SuiteResult::new(duration, completed),
                    allow_failure,
                    aborted: Some(HarnessError::Aborted { check, completed: Vec::new(), source }),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The process exit code: 0 iff every check passed, or failures are allowed and the suite
    /// ran to the end.
    pub fn exit_code(&self) -> i32 {
        if self.aborted.is_some() {
            return 1;
        }
        if self.suite.passed() || self.allow_failure { 0 } else { 1 }
    }

    /// Returns the fatal error of an aborted suite, or exits the process with
    /// [`exit_code`](Self::exit_code) if a check failed.
    pub fn ensure_ok(self) -> Result<()> {
        if let Some(err) = self.aborted {
            return Err(err.into());
        }
        match self.exit_code() {
            0 => Ok(()),
            code => std::process::exit(code),
        }
    }
}

fn summary_line(suite: &SuiteResult) -> String {
    let passed = suite.successes().count();
    let failed = suite.failures().count();
    let verdict = if failed == 0 { "ok".green().to_string() } else { "FAILED".red().to_string() };
    format!(
        "Check result: {verdict}. {} passed; {} failed; finished in {:.2?}",
        passed.green(),
        failed.red(),
        suite.duration
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ante_ledger::LedgerError;
    use figment::Jail;
    use std::time::Duration;

    fn suite(passes: &[bool]) -> SuiteResult {
        let results = passes
            .iter()
            .enumerate()
            .map(|(i, &pass)| {
                let name = format!("check-{i}");
                if pass {
                    CheckResult::success(name, Address::with_last_byte(i as u8))
                } else {
                    CheckResult::fail(name, Stage::Done, FailureKind::PredicateFalse, "false".into())
                }
            })
            .collect();
        SuiteResult::new(Duration::from_millis(5), results)
    }

    fn outage(completed: Vec<CheckResult>) -> HarnessError {
        HarnessError::Aborted {
            check: "second-dies".into(),
            completed,
            source: Box::new(LedgerError::Unavailable("connection reset".into()).into()),
        }
    }

    #[test]
    fn passing_suite_exits_zero() {
        let outcome = TestOutcome::from_run(Ok(suite(&[true, true])), false).unwrap();
        assert_eq!(outcome.exit_code(), 0);
        assert!(outcome.ensure_ok().is_ok());
    }

    #[test]
    fn empty_selection_exits_zero() {
        let outcome = TestOutcome::new(SuiteResult::default(), false);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn failures_exit_non_zero_unless_allowed() {
        assert_eq!(TestOutcome::new(suite(&[true, false]), false).exit_code(), 1);

        let allowed = TestOutcome::new(suite(&[true, false]), true);
        assert_eq!(allowed.exit_code(), 0);
        assert!(allowed.ensure_ok().is_ok());
    }

    #[test]
    fn aborted_suite_keeps_finished_checks() {
        let completed = suite(&[true]).results;
        let outcome = TestOutcome::from_run(Err(outage(completed)), true).unwrap();

        let names: Vec<_> = outcome.suite.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["check-0", "second-dies"]);
        assert!(outcome.suite.results[0].status.is_success());
        let interrupted = &outcome.suite.results[1];
        assert!(interrupted.status.is_failure());
        assert_eq!(interrupted.reason.as_deref(), Some("ledger unavailable: connection reset"));

        // failures being allowed does not cover an aborted suite
        assert_eq!(outcome.exit_code(), 1);
        let err = outcome.ensure_ok().unwrap_err();
        assert!(err.to_string().contains("second-dies"), "{err}");
    }

    #[test]
    fn other_errors_propagate() {
        let run = Err(HarnessError::from(LedgerError::Unavailable("refused".into())));
        let err = TestOutcome::from_run(run, false).unwrap_err();
        assert!(err.to_string().contains("refused"), "{err}");
    }

    #[test]
    fn cli_overrides_config_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                HarnessConfig::FILE_NAME,
                r#"
                [profile.default]
                rpc_url = "http://localhost:8545"

                [profile.fork]
                isolate_checks = false
                "#,
            )?;

            let args = TestArgs::parse_from([
                "test",
                "--profile",
                "fork",
                "--rpc-url",
                "http://127.0.0.1:9545",
                "--sender",
                "0x0000000000000000000000000000000000000002",
            ]);
            let config = args.load_config().map_err(|err| err.to_string())?;
            assert_eq!(config.rpc_url, "http://127.0.0.1:9545");
            assert_eq!(config.sender, Some(Address::with_last_byte(2)));
            assert!(!config.isolate_checks);
            Ok(())
        });
    }

    #[test]
    fn file_wins_without_overrides() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                HarnessConfig::FILE_NAME,
                r#"
                [profile.default]
                rpc_url = "http://node:8545"
                "#,
            )?;

            let args = TestArgs::parse_from(["test"]);
            let config = args.load_config().map_err(|err| err.to_string())?;
            assert_eq!(config.rpc_url, "http://node:8545");
            assert_eq!(config.sender, None);
            Ok(())
        });
    }
}
