//! Periodic Scheduler (§4.7): independent cadence triggers, each firing
//! when enough wall time has elapsed since its own last firing.

use std::time::{Duration, Instant};

struct Trigger {
    period: Duration,
    last_fired: Instant,
}

impl Trigger {
    fn new(hz: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / hz),
            last_fired: Instant::now(),
        }
    }

    /// Checks whether the period has elapsed and, if so, advances the
    /// trigger's clock and reports ready. Each trigger is independent, so
    /// two triggers can never preempt each other out of cadence order
    /// (§8): a call to one never perturbs another's `last_fired`.
    fn poll(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last_fired) >= self.period {
            self.last_fired = now;
            true
        } else {
            false
        }
    }
}

/// The six triggers from §4.7's table, each independently clocked.
pub struct Scheduler {
    heartbeat: Trigger,
    heartbeat_check: Trigger,
    streamrate: Trigger,
    battery: Trigger,
    override_tick: Trigger,
    status_snapshot: Trigger,
}

/// Which triggers fired on a given tick; the caller runs each side effect
/// named in §4.7's table for the ones marked `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Due {
    pub heartbeat: bool,
    pub heartbeat_check: bool,
    pub streamrate: bool,
    pub battery: bool,
    pub override_tick: bool,
    pub status_snapshot: bool,
}

impl Scheduler {
    pub fn new(sitl_output_present: bool) -> Self {
        Self {
            heartbeat: Trigger::new(1.0),
            heartbeat_check: Trigger::new(3.0),
            streamrate: Trigger::new(30.0),
            battery: Trigger::new(10.0),
            override_tick: Trigger::new(if sitl_output_present { 50.0 } else { 1.0 }),
            status_snapshot: Trigger::new(1.0),
        }
    }

    /// Run from the main loop (§4.4 phase 3). Skipped entirely by the
    /// caller while `setup_mode` or `target_system == -1` (§4.7).
    pub fn poll(&mut self) -> Due {
        let now = Instant::now();
        Due {
            heartbeat: self.heartbeat.poll(now),
            heartbeat_check: self.heartbeat_check.poll(now),
            streamrate: self.streamrate.poll(now),
            battery: self.battery.poll(now),
            override_tick: self.override_tick.poll(now),
            status_snapshot: self.status_snapshot.poll(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn streamrate_trigger_fires_well_before_battery_trigger() {
        let mut streamrate = Trigger::new(30.0);
        let mut battery = Trigger::new(10.0);
        sleep(Duration::from_millis(40));
        let now = Instant::now();
        assert!(streamrate.poll(now));
        assert!(!battery.poll(now));
    }

    #[test]
    fn triggers_are_independently_clocked() {
        let mut t_fast = Trigger::new(100.0);
        let mut t_slow = Trigger::new(1.0);
        let now = Instant::now();
        assert!(!t_fast.poll(now));
        // Advance only the fast trigger's internal clock reference by
        // simulating a later "now" without touching t_slow.
        let later = now + Duration::from_millis(20);
        assert!(t_fast.poll(later));
        assert!(!t_slow.poll(later));
    }

    #[test]
    fn sitl_present_runs_override_at_fifty_hz() {
        let sched = Scheduler::new(true);
        assert_eq!(sched.override_tick.period, Duration::from_secs_f64(1.0 / 50.0));
    }

    #[test]
    fn no_sitl_runs_override_at_one_hz() {
        let sched = Scheduler::new(false);
        assert_eq!(sched.override_tick.period, Duration::from_secs_f64(1.0));
    }
}
