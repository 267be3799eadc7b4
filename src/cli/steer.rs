use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{NaiveTime, TimeDelta, Utc};
use clap::Parser;
use tokio::{
    sync::Notify,
    time::{MissedTickBehavior, interval, sleep},
};

use crate::{
    api::home_assistant::Client,
    cli::{
        BatteryArgs,
        BoilerArgs,
        EntityArgs,
        GuardArgs,
        HomeAssistantArgs,
        PlanningArgs,
        snapshot::plan_now,
    },
    core::{
        dispatch::Dispatch,
        enforcer::{Enforcement, enforce},
        store::PlanStore,
    },
    prelude::*,
    quantity::power::Watts,
};

#[derive(Parser)]
pub struct SteerArgs {
    /// How often the active slot is applied and the import guard checked.
    #[clap(long, env = "ENFORCEMENT_PERIOD", default_value = "5min")]
    enforcement_period: humantime::Duration,

    /// How often the forecasts are re-fetched and the plan rebuilt.
    #[clap(long, env = "REPLAN_PERIOD", default_value = "15min")]
    replan_period: humantime::Duration,

    /// Fixed daily re-plan, shortly after the day-ahead prices roll over.
    #[clap(long, env = "DAILY_REPLAN_TIME", default_value = "00:10:00")]
    daily_replan_time: NaiveTime,

    #[clap(flatten)]
    home_assistant: HomeAssistantArgs,

    #[clap(flatten)]
    entities: EntityArgs,

    #[clap(flatten)]
    battery: BatteryArgs,

    #[clap(flatten)]
    boiler: BoilerArgs,

    #[clap(flatten)]
    planning: PlanningArgs,

    #[clap(flatten)]
    guard: GuardArgs,
}

impl SteerArgs {
    pub async fn run(self) -> Result {
        let should_terminate = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(
            signal_hook::consts::SIGTERM,
            Arc::clone(&should_terminate),
        )?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&should_terminate))?;

        let client = self.home_assistant.try_new_client()?;
        let steering = Arc::new(Steering {
            client,
            store: PlanStore::default(),
            replan_trigger: Notify::new(),
            should_terminate,
            args: self,
        });

        let planner = tokio::spawn({
            let steering = Arc::clone(&steering);
            async move { steering.planner_loop().await }
        });
        let enforcer = tokio::spawn({
            let steering = Arc::clone(&steering);
            async move { steering.enforcer_loop().await }
        });
        let daily = tokio::spawn({
            let steering = Arc::clone(&steering);
            async move { steering.daily_replan_loop().await }
        });

        let (planner, enforcer) = tokio::join!(planner, enforcer);
        daily.abort();
        planner?;
        enforcer?;
        info!("terminated");
        Ok(())
    }
}

struct Steering {
    args: SteerArgs,
    client: Client,
    store: PlanStore,
    replan_trigger: Notify,
    should_terminate: Arc<AtomicBool>,
}

impl Steering {
    /// Re-plan periodically and on explicit triggers.
    ///
    /// A burst of triggers coalesces into a single stored permit, and a
    /// re-plan in flight always runs to completion and swaps the store
    /// before the next one starts.
    async fn planner_loop(&self) {
        let mut replan_interval = interval(self.args.replan_period.into());
        replan_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.should_terminate.load(Ordering::Relaxed) {
            // The interval's first tick fires immediately: a restart re-plans
            // right away.
            tokio::select! {
                _ = replan_interval.tick() => {}
                () = self.replan_trigger.notified() => {}
            }

            let (_, plan) = plan_now(
                &self.client,
                &self.args.entities,
                self.args.battery,
                self.args.boiler,
                self.args.planning,
            )
            .await;
            info!(n_slots = plan.slots.len(), horizon_end = %plan.horizon_end, "re-planned");
            self.store.replace(plan);
        }
    }

    /// Apply the active slot at the enforcement period.
    async fn enforcer_loop(&self) {
        let mut tick_interval = interval(self.args.enforcement_period.into());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.should_terminate.load(Ordering::Relaxed) {
            tick_interval.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        let now = Utc::now().with_timezone(&self.args.planning.utc_offset);
        let import_power = match self.client.get_scalar(&self.args.entities.grid_import_power).await
        {
            Ok(Some(value)) => Watts(value),
            Ok(None) => {
                warn!("the grid import reading is unavailable, assuming none");
                Watts::ZERO
            }
            Err(error) => {
                warn!("failed to read the grid import: {error:#}");
                Watts::ZERO
            }
        };

        let enforcement = enforce(
            self.store.current().as_deref(),
            now,
            import_power,
            self.args.guard.import_ceiling,
        );
        match enforcement {
            Enforcement::Unplanned => debug!("no plan yet"),
            Enforcement::Expired => info!("the plan no longer covers the current instant"),
            Enforcement::Curtailed { import_power } => warn!(
                %import_power,
                ceiling = %self.args.guard.import_ceiling,
                "import over the ceiling, curtailing",
            ),
            Enforcement::Scheduled(_) => {}
        }
        self.apply(enforcement.dispatch()).await;
    }

    /// Push the dispatch to the actuators.
    ///
    /// Set-points are idempotent, so a failed call is only logged: the next
    /// tick re-issues it anyway.
    async fn apply(&self, dispatch: Dispatch) {
        debug!(?dispatch, "applying");
        let entities = &self.args.entities;

        if let Err(error) = self
            .client
            .set_number(&entities.battery_charge_current, dispatch.battery_charge_current.0)
            .await
        {
            warn!("failed to set the battery charge current: {error:#}");
        }
        if let Err(error) =
            self.client.set_number(&entities.export_limit, dispatch.export_limit.0).await
        {
            warn!("failed to set the export limit: {error:#}");
        }

        let (relay_1, relay_2) = dispatch.heater_stage.relays();
        if let Err(error) = self.client.set_switch(&entities.boiler_relay_1, relay_1).await {
            warn!("failed to switch the first boiler relay: {error:#}");
        }
        if let Err(error) = self.client.set_switch(&entities.boiler_relay_2, relay_2).await {
            warn!("failed to switch the second boiler relay: {error:#}");
        }
    }

    /// Trigger a re-plan at the fixed daily time.
    async fn daily_replan_loop(&self) {
        loop {
            let now = Utc::now().with_timezone(&self.args.planning.utc_offset);
            let today = now.with_time(self.args.daily_replan_time).single().unwrap_or(now);
            let next = if today > now { today } else { today + TimeDelta::days(1) };
            let wait = (next - now).to_std().unwrap_or(Duration::from_secs(60));
            sleep(wait).await;
            self.replan_trigger.notify_one();
        }
    }
}
