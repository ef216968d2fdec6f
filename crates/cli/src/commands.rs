//! Subcommand implementations
//!
//! Each command returns the text to print, so it can be exercised against
//! the in-memory repository.

use crate::config::AppConfig;
use alerting::{BellAlerter, ThrottledAlerter};
use anyhow::{bail, Context};
use camera_capture::ReplaySource;
use dms::{Classification, ScriptedLoader};
use driver_auth::{AuthModule, RegistrationForm};
use session::{
    complete_orphaned_journeys, generate_report, EndReason, SessionController, SessionNotice,
};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use storage::{Driver, DriverDirectory, DriverId, JourneyId, JourneyStore, SqliteRepository};
use tracing::info;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parameters of a replayed monitoring run
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub frames: u32,
    /// Every n-th frame is classified drowsy (0 = never)
    pub drowsy_every: u32,
    pub frame_interval: Duration,
}

impl SimulationPlan {
    fn script(&self) -> Vec<Classification> {
        (1..=self.frames)
            .map(|n| {
                if self.drowsy_every > 0 && n % self.drowsy_every == 0 {
                    Classification::Drowsy
                } else {
                    Classification::Alert
                }
            })
            .collect()
    }
}

pub struct App {
    journeys: Arc<dyn JourneyStore>,
    directory: Arc<dyn DriverDirectory>,
    config: AppConfig,
}

impl App {
    pub fn new(
        journeys: Arc<dyn JourneyStore>,
        directory: Arc<dyn DriverDirectory>,
        config: AppConfig,
    ) -> Self {
        Self {
            journeys,
            directory,
            config,
        }
    }

    /// Open the configured database
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let repo = Arc::new(
            SqliteRepository::connect(&config.database)
                .await
                .with_context(|| format!("cannot open database {}", config.database.url))?,
        );
        Ok(Self::new(repo.clone(), repo, config))
    }

    fn auth(&self) -> AuthModule {
        AuthModule::new(Arc::clone(&self.directory))
    }

    async fn login(&self, username: &str, password: &str) -> anyhow::Result<Driver> {
        Ok(self.auth().login(username, password).await?)
    }

    async fn admin_login(&self, username: &str, password: &str) -> anyhow::Result<()> {
        self.auth().admin_login(username, password).await?;
        Ok(())
    }

    pub async fn init(&self) -> anyhow::Result<String> {
        let created = self.auth().ensure_default_admin().await?;
        Ok(if created {
            "Database initialized; default admin account created".to_string()
        } else {
            "Database initialized".to_string()
        })
    }

    pub async fn register(&self, form: &RegistrationForm) -> anyhow::Result<String> {
        let driver = self.auth().register(form).await?;
        Ok(format!(
            "Registration successful! Driver ID: {}",
            driver.id
        ))
    }

    pub async fn login_status(&self, username: &str, password: &str) -> anyhow::Result<String> {
        let driver = self.login(username, password).await?;
        let mut out = format!("Welcome, {}!\n", driver.name);
        match self.journeys.get_active_journey(driver.id).await? {
            Some(id) => writeln!(out, "Journey {} is in progress", id)?,
            None => writeln!(out, "No journey in progress")?,
        }
        Ok(out)
    }

    pub async fn report(
        &self,
        username: &str,
        password: &str,
        json: bool,
    ) -> anyhow::Result<String> {
        let driver = self.login(username, password).await?;
        let report = generate_report(self.journeys.as_ref(), &driver).await?;
        if json {
            Ok(serde_json::to_string_pretty(&report)?)
        } else {
            Ok(report.to_string())
        }
    }

    /// Run one journey over a replayed frame stream with a scripted
    /// classifier. Ends when the stream runs out or on Ctrl-C.
    pub async fn simulate(
        &self,
        username: &str,
        password: &str,
        plan: &SimulationPlan,
    ) -> anyhow::Result<String> {
        let driver = self.login(username, password).await?;

        let camera = ReplaySource::blank(plan.frames).with_frame_interval(plan.frame_interval);
        let classifier = ScriptedLoader::new(plan.script());
        let alarm = ThrottledAlerter::new(BellAlerter, self.config.alert.clone());
        let controller = SessionController::new(
            Arc::clone(&self.journeys),
            Arc::new(camera),
            Arc::new(classifier),
            self.config.detection.clone(),
            self.config.session.clone(),
        )
        .with_alerter(Arc::new(alarm));

        let mut notices = controller.subscribe();
        let journey_id = controller.start_session(&driver).await?;
        println!("Journey {} started; press Ctrl-C to end it", journey_id);

        let interrupted = tokio::select! {
            count = wait_for_end(&mut notices, journey_id) => {
                return Ok(format!(
                    "Camera stream ended; journey {} completed with {} drowsiness events",
                    journey_id, count
                ));
            }
            signal = tokio::signal::ctrl_c() => signal,
        };
        interrupted.context("failed to listen for Ctrl-C")?;

        controller.end_session(driver.id).await?;
        let count = self
            .journeys
            .list_journeys(driver.id)
            .await?
            .into_iter()
            .find(|j| j.id == journey_id)
            .map(|j| j.drowsiness_count)
            .unwrap_or_default();
        Ok(format!(
            "Journey {} ended with {} drowsiness events",
            journey_id, count
        ))
    }

    pub async fn recover(&self) -> anyhow::Result<String> {
        let recovered = complete_orphaned_journeys(self.journeys.as_ref(), &[]).await?;
        info!(count = recovered.len(), "Recovery finished");
        Ok(format!("Completed {} orphaned journeys", recovered.len()))
    }

    pub async fn admin(
        &self,
        username: &str,
        password: &str,
        action: &AdminAction,
    ) -> anyhow::Result<String> {
        self.admin_login(username, password).await?;

        let mut out = String::new();
        match action {
            AdminAction::Stats => {
                let stats = self.directory.statistics().await?;
                writeln!(out, "Database Statistics:")?;
                writeln!(out)?;
                writeln!(out, "Total Drivers: {}", stats.total_drivers)?;
                writeln!(out, "Total Journeys: {}", stats.total_journeys)?;
                writeln!(out, "Total Drowsiness Events: {}", stats.total_drowsiness_events)?;
                writeln!(out, "Currently Active Journeys: {}", stats.active_journeys)?;
            }
            AdminAction::Drivers => {
                for d in self.directory.list_drivers().await? {
                    writeln!(
                        out,
                        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                        d.id, d.name, d.age, d.gender, d.license_no, d.place, d.phone, d.username
                    )?;
                }
            }
            AdminAction::Journeys => {
                for j in self.directory.list_all_journeys().await? {
                    let end = j
                        .end_time
                        .map(|t| t.format(TIME_FORMAT).to_string())
                        .unwrap_or_else(|| "Ongoing".to_string());
                    writeln!(
                        out,
                        "{}\t{}\t{}\t{}\t{}\t{}",
                        j.id,
                        j.driver_id,
                        j.start_time.format(TIME_FORMAT),
                        end,
                        j.drowsiness_count,
                        j.status
                    )?;
                }
            }
            AdminAction::DeleteDriver(id) => {
                if !self.directory.delete_driver(*id).await? {
                    bail!("Driver {} not found", id);
                }
                writeln!(out, "Driver and related journeys deleted successfully")?;
            }
            AdminAction::DeleteJourney(id) => {
                if !self.directory.delete_journey(*id).await? {
                    bail!("Journey {} not found", id);
                }
                writeln!(out, "Journey deleted successfully")?;
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Stats,
    Drivers,
    Journeys,
    DeleteDriver(DriverId),
    DeleteJourney(JourneyId),
}

async fn wait_for_end(
    notices: &mut tokio::sync::broadcast::Receiver<SessionNotice>,
    journey_id: JourneyId,
) -> u32 {
    loop {
        match notices.recv().await {
            Ok(SessionNotice::Ended {
                journey_id: ended,
                drowsiness_count,
                reason: EndReason::StreamEnded,
                ..
            }) if ended == journey_id => return drowsiness_count,
            Ok(SessionNotice::DrowsinessDetected {
                journey_id: id,
                count,
                ..
            }) if id == journey_id => println!("Drowsiness detected ({} so far)", count),
            Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::Repository;

    fn app() -> (Arc<Repository>, App) {
        let repo = Arc::new(Repository::new());
        let mut config = AppConfig::default();
        config.detection.raise_alerts = false;
        let app = App::new(repo.clone(), repo.clone(), config);
        (repo, app)
    }

    fn form(username: &str) -> RegistrationForm {
        RegistrationForm {
            name: "Farah Khan".into(),
            age: "38".into(),
            gender: "Female".into(),
            license_no: "UP-1420150078901".into(),
            place: "Lucknow".into(),
            phone: "9415012345".into(),
            username: username.into(),
            password: "pass1234".into(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (_repo, app) = app();
        let out = app.register(&form("farah")).await.unwrap();
        assert!(out.starts_with("Registration successful!"));

        let out = app.login_status("farah", "pass1234").await.unwrap();
        assert!(out.contains("Welcome, Farah Khan!"));
        assert!(out.contains("No journey in progress"));

        let err = app.login_status("farah", "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid username or password");
    }

    #[tokio::test]
    async fn test_report_without_journeys() {
        let (_repo, app) = app();
        app.register(&form("farah")).await.unwrap();

        let text = app.report("farah", "pass1234", false).await.unwrap();
        assert_eq!(text.trim(), "No journeys found for this driver");

        let json = app.report("farah", "pass1234", true).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["journeys"].as_array().unwrap().len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_simulation_records_drowsy_frames() {
        let (repo, app) = app();
        let driver = app.auth().register(&form("farah")).await.unwrap();
        let plan = SimulationPlan {
            frames: 6,
            drowsy_every: 2,
            frame_interval: Duration::ZERO,
        };

        let out = app.simulate("farah", "pass1234", &plan).await.unwrap();
        assert!(out.contains("with 3 drowsiness events"), "{}", out);

        let journeys = repo.list_journeys(driver.id).await.unwrap();
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].drowsiness_count, 3);
        assert!(!journeys[0].is_active());
    }

    #[tokio::test]
    async fn test_admin_requires_credentials() {
        let (_repo, app) = app();
        app.init().await.unwrap();

        let err = app
            .admin("admin", "wrong", &AdminAction::Stats)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid username or password");

        let out = app.admin("admin", "admin123", &AdminAction::Stats).await.unwrap();
        assert!(out.contains("Total Drivers: 0"));
        assert!(out.contains("Currently Active Journeys: 0"));
    }

    #[tokio::test]
    async fn test_admin_delete_and_recover() {
        let (repo, app) = app();
        app.init().await.unwrap();
        let driver = app.auth().register(&form("farah")).await.unwrap();
        let journey = repo
            .insert_journey(driver.id, chrono::Utc::now())
            .await
            .unwrap();

        assert_eq!(app.recover().await.unwrap(), "Completed 1 orphaned journeys");
        let listing = app
            .admin("admin", "admin123", &AdminAction::Journeys)
            .await
            .unwrap();
        assert!(listing.contains("Completed"));

        app.admin("admin", "admin123", &AdminAction::DeleteJourney(journey))
            .await
            .unwrap();
        assert!(app
            .admin("admin", "admin123", &AdminAction::DeleteJourney(journey))
            .await
            .is_err());
        app.admin("admin", "admin123", &AdminAction::DeleteDriver(driver.id))
            .await
            .unwrap();
        assert!(repo.get_driver(driver.id).await.unwrap().is_none());
    }
}
