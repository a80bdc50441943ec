//! Job registration: handlers, per-job options and cron schedules.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use prodkit_context::WorkerExecutionPayload;
use prodkit_core::config::WorkerConfig;
use prodkit_core::error::AppError;
use prodkit_core::result::AppResult;

use crate::executor::JobExecutionError;
use crate::lifecycle::JobContext;
use crate::request::{
    EXECUTION_CONTEXT_KEY, Kwargs, REQUEST_CORRELATION_ID_KEY, TENANT_ID_KEY,
};
use crate::transport::ResultRetention;

/// Arguments a handler receives, with the injected context entries split out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobArguments {
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Caller-supplied keyword arguments.
    pub kwargs: Kwargs,
    /// Tenant the job was enqueued for.
    pub tenant_id: Option<String>,
    /// Correlation id of the enqueuing unit of work.
    pub request_correlation_id: Option<String>,
    /// Execution state of the enqueuing unit of work.
    pub execution: WorkerExecutionPayload,
}

impl JobArguments {
    /// Split a queued job's arguments.
    ///
    /// A malformed `prodkit_context` entry is a permanent failure; retrying
    /// cannot fix it.
    pub fn decode(args: Vec<Value>, mut kwargs: Kwargs) -> Result<Self, JobExecutionError> {
        let tenant_id = take_string(&mut kwargs, TENANT_ID_KEY);
        let request_correlation_id = take_string(&mut kwargs, REQUEST_CORRELATION_ID_KEY);
        let execution = match kwargs.remove(EXECUTION_CONTEXT_KEY) {
            None | Some(Value::Null) => WorkerExecutionPayload::default(),
            Some(raw) => serde_json::from_value(raw).map_err(|e| {
                JobExecutionError::Permanent(format!("Malformed {EXECUTION_CONTEXT_KEY}: {e}"))
            })?,
        };

        Ok(Self {
            args,
            kwargs,
            tenant_id: tenant_id.filter(|t| !t.is_empty()),
            request_correlation_id,
            execution,
        })
    }

    /// Positional argument `index`, deserialized.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, JobExecutionError> {
        let raw = self.args.get(index).cloned().ok_or_else(|| {
            JobExecutionError::Permanent(format!("Missing positional argument {index}"))
        })?;
        serde_json::from_value(raw).map_err(|e| {
            JobExecutionError::Permanent(format!("Invalid positional argument {index}: {e}"))
        })
    }

    /// Keyword argument `key`, deserialized, if present.
    pub fn kwarg<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, JobExecutionError> {
        self.kwargs
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                JobExecutionError::Permanent(format!("Invalid keyword argument '{key}': {e}"))
            })
    }
}

fn take_string(kwargs: &mut Kwargs, key: &str) -> Option<String> {
    match kwargs.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// A job body.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run the job.
    async fn run(&self, ctx: JobContext, args: JobArguments) -> Result<Value, JobExecutionError>;
}

/// [`JobHandler`] backed by an async closure. See [`handler_fn`].
pub struct FnHandler<F>(F);

/// Wrap an async function as a [`JobHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(JobContext, JobArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, JobExecutionError>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobContext, JobArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, JobExecutionError>> + Send + 'static,
{
    async fn run(&self, ctx: JobContext, args: JobArguments) -> Result<Value, JobExecutionError> {
        (self.0)(ctx, args).await
    }
}

/// Per-job overrides of the worker defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// How long to keep the result.
    pub keep_result: Option<Duration>,
    /// Maximum run time of one attempt.
    pub timeout: Option<Duration>,
    /// Keep the result without expiry; overrides `keep_result`.
    pub keep_result_forever: Option<bool>,
    /// Maximum number of attempts.
    pub max_tries: Option<u32>,
}

impl JobOptions {
    /// Options with every field taken from the worker config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep results for `keep`.
    pub fn keep_result(mut self, keep: Duration) -> Self {
        self.keep_result = Some(keep);
        self
    }

    /// Abort attempts running longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Keep results forever.
    pub fn keep_result_forever(mut self, forever: bool) -> Self {
        self.keep_result_forever = Some(forever);
        self
    }

    /// Give up after `max_tries` attempts.
    pub fn max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = Some(max_tries);
        self
    }

    /// Effective attempt timeout.
    pub fn effective_timeout(&self, config: &WorkerConfig) -> Duration {
        self.timeout
            .unwrap_or(Duration::from_secs(config.job_timeout_seconds))
    }

    /// Effective attempt limit.
    pub fn effective_max_tries(&self, config: &WorkerConfig) -> u32 {
        self.max_tries.unwrap_or(config.max_tries).max(1)
    }

    /// Effective result retention.
    pub fn retention(&self, config: &WorkerConfig) -> ResultRetention {
        if self.keep_result_forever.unwrap_or(false) {
            return ResultRetention::Forever;
        }
        let keep = self
            .keep_result
            .unwrap_or(Duration::from_secs(config.keep_result_seconds));
        if keep.is_zero() {
            ResultRetention::Discard
        } else {
            ResultRetention::For(keep)
        }
    }
}

/// One field of a cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronField {
    /// A single value.
    At(u32),
    /// Any of several values.
    AnyOf(BTreeSet<u32>),
}

impl CronField {
    fn values(&self) -> Vec<u32> {
        match self {
            Self::At(v) => vec![*v],
            Self::AnyOf(set) => set.iter().copied().collect(),
        }
    }

    fn render(&self) -> String {
        self.values()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl From<u32> for CronField {
    fn from(value: u32) -> Self {
        Self::At(value)
    }
}

impl<const N: usize> From<[u32; N]> for CronField {
    fn from(values: [u32; N]) -> Self {
        Self::AnyOf(values.into_iter().collect())
    }
}

impl From<Vec<u32>> for CronField {
    fn from(values: Vec<u32>) -> Self {
        Self::AnyOf(values.into_iter().collect())
    }
}

/// Day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    fn as_str(self) -> &'static str {
        match self {
            Self::Mon => "MON",
            Self::Tue => "TUE",
            Self::Wed => "WED",
            Self::Thu => "THU",
            Self::Fri => "FRI",
            Self::Sat => "SAT",
            Self::Sun => "SUN",
        }
    }
}

/// When a periodic job fires. Unset fields match every value; `second`
/// defaults to 0 so a schedule fires at most once per minute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    pub month: Option<CronField>,
    pub day: Option<CronField>,
    pub weekday: Option<BTreeSet<Weekday>>,
    pub hour: Option<CronField>,
    pub minute: Option<CronField>,
    pub second: Option<CronField>,
}

impl Default for CronSchedule {
    fn default() -> Self {
        Self {
            month: None,
            day: None,
            weekday: None,
            hour: None,
            minute: None,
            second: Some(CronField::At(0)),
        }
    }
}

impl CronSchedule {
    /// Every minute at second 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn month(mut self, month: impl Into<CronField>) -> Self {
        self.month = Some(month.into());
        self
    }

    pub fn day(mut self, day: impl Into<CronField>) -> Self {
        self.day = Some(day.into());
        self
    }

    pub fn weekday(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.weekday = Some(days.into_iter().collect());
        self
    }

    pub fn hour(mut self, hour: impl Into<CronField>) -> Self {
        self.hour = Some(hour.into());
        self
    }

    pub fn minute(mut self, minute: impl Into<CronField>) -> Self {
        self.minute = Some(minute.into());
        self
    }

    /// Fire at `second`; `None` fires every second.
    pub fn second(mut self, second: Option<CronField>) -> Self {
        self.second = second;
        self
    }

    /// Check every field is in range.
    pub fn validate(&self) -> AppResult<()> {
        let ranges = [
            ("second", &self.second, 0, 59),
            ("minute", &self.minute, 0, 59),
            ("hour", &self.hour, 0, 23),
            ("day", &self.day, 1, 31),
            ("month", &self.month, 1, 12),
        ];
        for (name, field, min, max) in ranges {
            let Some(field) = field else { continue };
            let values = field.values();
            if values.is_empty() {
                return Err(AppError::validation(format!("Cron {name} has no values")));
            }
            if let Some(bad) = values.iter().find(|v| !(min..=max).contains(*v)) {
                return Err(AppError::validation(format!(
                    "Cron {name} {bad} is outside {min}..={max}"
                )));
            }
        }
        if self.weekday.as_ref().is_some_and(BTreeSet::is_empty) {
            return Err(AppError::validation("Cron weekday has no values"));
        }
        Ok(())
    }

    /// Six-field cron expression (`sec min hour day month weekday`).
    pub fn to_cron_expression(&self) -> String {
        fn field(f: &Option<CronField>) -> String {
            f.as_ref().map_or_else(|| "*".to_string(), CronField::render)
        }

        let weekday = self.weekday.as_ref().map_or_else(
            || "*".to_string(),
            |days| {
                days.iter()
                    .map(|d| d.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            },
        );

        format!(
            "{} {} {} {} {} {}",
            field(&self.second),
            field(&self.minute),
            field(&self.hour),
            field(&self.day),
            field(&self.month),
            weekday
        )
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cron_expression())
    }
}

/// A registered job.
#[derive(Clone)]
pub struct RegisteredJob {
    /// Job name.
    pub name: String,
    /// Job body.
    pub handler: Arc<dyn JobHandler>,
    /// Per-job options.
    pub options: JobOptions,
    /// Schedule, for periodic jobs.
    pub schedule: Option<CronSchedule>,
}

impl fmt::Debug for RegisteredJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredJob")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("schedule", &self.schedule.as_ref().map(ToString::to_string))
            .finish()
    }
}

/// Every job a worker can run.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, RegisteredJob>,
    order: Vec<String>,
}

impl JobRegistry {
    /// Start building a registry.
    pub fn builder() -> JobRegistryBuilder {
        JobRegistryBuilder::default()
    }

    /// Job registered as `name`.
    pub fn get(&self, name: &str) -> Option<&RegisteredJob> {
        self.jobs.get(name)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Periodic jobs in registration order.
    pub fn cron_jobs(&self) -> impl Iterator<Item = &RegisteredJob> {
        self.order
            .iter()
            .filter_map(|name| self.jobs.get(name))
            .filter(|job| job.schedule.is_some())
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Builder for [`JobRegistry`].
#[derive(Default)]
pub struct JobRegistryBuilder {
    entries: Vec<RegisteredJob>,
}

impl JobRegistryBuilder {
    /// Register an on-demand job.
    pub fn job(
        mut self,
        name: impl Into<String>,
        handler: impl JobHandler + 'static,
        options: JobOptions,
    ) -> Self {
        self.entries.push(RegisteredJob {
            name: name.into(),
            handler: Arc::new(handler),
            options,
            schedule: None,
        });
        self
    }

    /// Register a periodic job. It also remains enqueueable by name.
    pub fn cron(
        mut self,
        name: impl Into<String>,
        handler: impl JobHandler + 'static,
        schedule: CronSchedule,
    ) -> Self {
        self.entries.push(RegisteredJob {
            name: name.into(),
            handler: Arc::new(handler),
            options: JobOptions::default(),
            schedule: Some(schedule),
        });
        self
    }

    /// Validate and build. Duplicate names and invalid schedules are errors.
    pub fn build(self) -> AppResult<JobRegistry> {
        let mut registry = JobRegistry::default();
        for entry in self.entries {
            if entry.name.is_empty() {
                return Err(AppError::validation("Job name must not be empty"));
            }
            if registry.jobs.contains_key(&entry.name) {
                return Err(AppError::conflict(format!(
                    "Job '{}' is registered more than once",
                    entry.name
                )));
            }
            if let Some(schedule) = &entry.schedule {
                schedule.validate()?;
            }
            tracing::info!(job_name = %entry.name, cron = ?entry.schedule.as_ref().map(ToString::to_string), "Registered job");
            registry.order.push(entry.name.clone());
            registry.jobs.insert(entry.name.clone(), entry);
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> impl JobHandler {
        handler_fn(|_ctx, _args| async { Ok(Value::Null) })
    }

    #[test]
    fn test_decode_splits_injected_fields() {
        let mut kwargs = Kwargs::new();
        kwargs.insert(TENANT_ID_KEY.into(), json!("t1"));
        kwargs.insert(REQUEST_CORRELATION_ID_KEY.into(), json!("req-1"));
        kwargs.insert(EXECUTION_CONTEXT_KEY.into(), json!({"is_during_installation": true}));
        kwargs.insert("to".into(), json!("a@example.com"));

        let args = JobArguments::decode(vec![json!(7)], kwargs).unwrap();
        assert_eq!(args.tenant_id.as_deref(), Some("t1"));
        assert_eq!(args.request_correlation_id.as_deref(), Some("req-1"));
        assert!(args.execution.is_during_installation);
        assert_eq!(args.kwargs.len(), 1);
        assert_eq!(args.arg::<u32>(0).unwrap(), 7);
        assert_eq!(args.kwarg::<String>("to").unwrap().as_deref(), Some("a@example.com"));
        assert_eq!(args.kwarg::<String>("missing").unwrap(), None);
        assert!(matches!(args.arg::<u32>(1), Err(JobExecutionError::Permanent(_))));
    }

    #[test]
    fn test_decode_tolerates_missing_or_null_fields() {
        let mut kwargs = Kwargs::new();
        kwargs.insert(TENANT_ID_KEY.into(), Value::Null);
        let args = JobArguments::decode(vec![], kwargs).unwrap();
        assert_eq!(args.tenant_id, None);
        assert!(!args.execution.is_during_installation);
    }

    #[test]
    fn test_decode_rejects_malformed_execution_payload() {
        let mut kwargs = Kwargs::new();
        kwargs.insert(EXECUTION_CONTEXT_KEY.into(), json!("nope"));
        assert!(matches!(
            JobArguments::decode(vec![], kwargs),
            Err(JobExecutionError::Permanent(_))
        ));
    }

    #[test]
    fn test_option_resolution() {
        let config = WorkerConfig::default();
        let defaults = JobOptions::new();
        assert_eq!(
            defaults.effective_timeout(&config),
            Duration::from_secs(config.job_timeout_seconds)
        );
        assert_eq!(defaults.effective_max_tries(&config), config.max_tries);
        assert_eq!(
            defaults.retention(&config),
            ResultRetention::For(Duration::from_secs(config.keep_result_seconds))
        );

        let custom = JobOptions::new()
            .timeout(Duration::from_secs(5))
            .max_tries(2)
            .keep_result(Duration::ZERO);
        assert_eq!(custom.effective_timeout(&config), Duration::from_secs(5));
        assert_eq!(custom.effective_max_tries(&config), 2);
        assert_eq!(custom.retention(&config), ResultRetention::Discard);

        let forever = custom.keep_result_forever(true);
        assert_eq!(forever.retention(&config), ResultRetention::Forever);
    }

    #[test]
    fn test_cron_expression() {
        assert_eq!(CronSchedule::new().to_cron_expression(), "0 * * * * *");
        assert_eq!(
            CronSchedule::new().hour(3).minute([0, 30]).to_cron_expression(),
            "0 0,30 3 * * *"
        );
        assert_eq!(
            CronSchedule::new()
                .weekday([Weekday::Fri, Weekday::Mon])
                .hour(9)
                .minute(0)
                .to_cron_expression(),
            "0 0 9 * * MON,FRI"
        );
        assert_eq!(CronSchedule::new().second(None).to_cron_expression(), "* * * * * *");
    }

    #[test]
    fn test_cron_validation() {
        assert!(CronSchedule::new().hour(23).validate().is_ok());
        assert!(CronSchedule::new().hour(24).validate().is_err());
        assert!(CronSchedule::new().day(0).validate().is_err());
        assert!(CronSchedule::new().month(vec![1, 13]).validate().is_err());
        assert!(CronSchedule::new().weekday([]).validate().is_err());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let err = JobRegistry::builder()
            .job("a", noop(), JobOptions::new())
            .job("a", noop(), JobOptions::new())
            .build()
            .unwrap_err();
        assert_eq!(err.kind, prodkit_core::ErrorKind::Conflict);
    }

    #[test]
    fn test_registry_lookup_and_cron_listing() {
        let registry = JobRegistry::builder()
            .job("send_email", noop(), JobOptions::new())
            .cron("nightly", noop(), CronSchedule::new().hour(2).minute(0))
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("send_email"));
        assert!(registry.get("nightly").unwrap().schedule.is_some());
        assert_eq!(registry.names().collect::<Vec<_>>(), ["send_email", "nightly"]);
        let cron: Vec<_> = registry.cron_jobs().map(|j| j.name.as_str()).collect();
        assert_eq!(cron, ["nightly"]);
    }
}
