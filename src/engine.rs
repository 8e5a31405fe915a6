//! Protocol Engine (§4.4, §4.5): the main loop and per-message dispatch
//! table tying every other module together. One big owned-state async
//! function that drives sub-phases by calling out to plain methods rather
//! than scattering state across ambient globals.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::axis::{recompute_control_mirror, ControlMirror, RcLimits};
use crate::battery::BatteryState;
use crate::codec::{Frame, FrameCodec, SimpleCodec, WireMessage};
use crate::journal::{frame_record, JournalHandle};
use crate::link::{Link, LinkSet};
use crate::link_delay::DelayOutcome;
use crate::operator::{FlightModeCommand, OperatorCommand};
use crate::override_rc::{OverrideVector, SitlOutput};
use crate::params::{ParamSetRequest, ParamTable};
use crate::scheduler::Scheduler;
use crate::settings::Settings;
use crate::status::{flight_mode_name, StatusMirror};
use crate::transport::Transport;
use crate::waypoint::{load_trivial_waypoint_file, AppendOutcome, UploadRequestOutcome, WaypointLoader, WaypointOp};

/// An Output link (§3): receives a fan-out copy of whatever the master link
/// produces. Unlike a [`Link`] it carries no health/failover state of its
/// own — it's a pure consumer.
pub struct OutputLink {
    pub transport: Box<dyn Transport>,
    pub codec: Box<dyn FrameCodec>,
}

impl OutputLink {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            codec: Box::new(SimpleCodec::new()),
        }
    }
}

/// Fixed parameters the engine does not mutate at runtime (§6 CLI flags that
/// aren't also live `set`table [`Settings`]).
pub struct EngineConfig {
    pub source_system: u8,
    pub source_component: u8,
    pub aircraft: Option<String>,
    pub mav10: bool,
    pub quadcopter: bool,
}

/// All engine-owned state (§3's Status Mirror plus every subsystem it
/// coordinates). One instance per process.
pub struct Engine {
    pub config: EngineConfig,
    pub links: LinkSet,
    pub outputs: Vec<OutputLink>,
    pub status: StatusMirror,
    pub settings: Settings,
    pub params: ParamTable,
    pub param_set_inflight: Option<ParamSetRequest>,
    pub waypoints: WaypointLoader,
    pub battery: BatteryState,
    pub overrides: OverrideVector,
    pub rc_limits: RcLimits,
    pub control_mirror: ControlMirror,
    pub sitl: Option<SitlOutput>,
    pub journal: Option<JournalHandle>,
    pub scheduler: Scheduler,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        links: LinkSet,
        outputs: Vec<OutputLink>,
        sitl: Option<SitlOutput>,
        journal: Option<JournalHandle>,
    ) -> Self {
        let sitl_present = sitl.is_some();
        Self {
            config,
            links,
            outputs,
            status: StatusMirror::default(),
            settings: Settings::default(),
            params: ParamTable::default(),
            param_set_inflight: None,
            waypoints: WaypointLoader::default(),
            battery: BatteryState::default(),
            overrides: OverrideVector::default(),
            rc_limits: RcLimits::default(),
            control_mirror: ControlMirror::default(),
            sitl,
            journal,
            scheduler: Scheduler::new(sitl_present),
        }
    }

    /// The main loop (§4.4): poll every link for inbound bytes, dispatch any
    /// frames, run the scheduler's periodic side effects, repeat. No true
    /// OS-level readiness multiplexing across a dynamic `Vec<Box<dyn
    /// Transport>>` — see DESIGN.md for why this is a plain poll-and-sleep
    /// loop rather than a `tokio::select!` over dynamic branches.
    pub async fn run(&mut self, mut operator_rx: tokio::sync::mpsc::UnboundedReceiver<String>) -> Result<()> {
        loop {
            let mut did_work = false;

            for link_num in 0..self.links.links.len() {
                did_work |= self.poll_link(link_num).await?;
            }

            for idx in 0..self.outputs.len() {
                let bytes = self.outputs[idx].transport.recv().await.unwrap_or_default();
                if !bytes.is_empty() {
                    did_work = true;
                    // Outputs are consumers; any bytes we receive from one
                    // (e.g. a ground-station sending a command) feed back in
                    // through the current master, mirroring mavproxy's
                    // "any output can drive the vehicle too" behavior.
                    let frames = self.outputs[idx].codec.feed(&bytes);
                    for frame in frames {
                        self.send_to_master(&frame).await;
                    }
                }
            }

            while let Ok(line) = operator_rx.try_recv() {
                did_work = true;
                self.handle_operator_line(&line).await;
            }

            // §4.7: the whole periodic scheduler is skipped until a vehicle
            // has been identified and setup mode has been exited.
            let scheduler_active = !self.status.setup_mode
                && self.status.target_system != -1
                && self.status.target_component != -1;
            if scheduler_active {
                let due = self.scheduler.poll();
                if due.heartbeat || due.heartbeat_check || due.streamrate || due.battery
                    || due.override_tick || due.status_snapshot
                {
                    did_work = true;
                    self.run_scheduled(due).await;
                }
            }

            if !did_work {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }

    async fn poll_link(&mut self, link_num: usize) -> Result<bool> {
        let bytes = match self.links.links[link_num].transport.recv().await {
            Ok(b) => b,
            Err(e) => {
                warn!(link = link_num, error = %e, "transport error, marking link errored");
                self.links.links[link_num].link_error = true;
                return Ok(false);
            }
        };
        if bytes.is_empty() {
            return Ok(false);
        }

        if let Some(journal) = &self.journal {
            journal.enqueue_raw(bytes.clone());
        }

        let frames = self.links.links[link_num].codec.feed(&bytes);
        for frame in frames {
            self.dispatch(link_num, frame).await;
        }
        Ok(true)
    }

    /// §4.5's per-message dispatch table. Journals the frame first (even a
    /// delayed link's traffic is worth keeping a record of), then drops it
    /// if the link is currently delayed, otherwise runs the type-specific
    /// handler, records it in the Status Mirror, and fans it out to every
    /// Output link whose `mavfwd` setting is enabled.
    async fn dispatch(&mut self, link_num: usize, frame: Frame) {
        self.links.links[link_num].messages_in += 1;

        if frame.body.is_bad_data() {
            if !self.links.links[link_num].warned_bad_data {
                warn!(link = link_num, "received unparsable data, will not warn again");
                self.links.links[link_num].warned_bad_data = true;
            }
            self.status.mav_error += 1;
            return;
        }

        if let Some(usec) = frame.usec {
            match self.links.on_usec(link_num, usec) {
                DelayOutcome::DelayOnset => {
                    if !self.links.links[link_num].warned_delayed {
                        warn!(link = link_num, "link delayed");
                        self.links.links[link_num].warned_delayed = true;
                    }
                }
                DelayOutcome::DelayRecovery => {
                    info!(link = link_num, "link caught up");
                    self.links.links[link_num].warned_delayed = false;
                }
                DelayOutcome::Wrapped => {
                    debug!("usec clock wrapped, resetting delay tracking");
                }
                DelayOutcome::Normal => {}
            }
        }

        // Logged before the delay check so a delayed link's traffic still
        // shows up in the journal even though it isn't otherwise processed.
        if let Some(journal) = &self.journal {
            if let Ok(encoded) = self.links.links[link_num].codec.encode(&frame) {
                let usec = frame.usec.unwrap_or(0);
                journal.enqueue_parsed(frame_record(usec, link_num, &encoded));
            }
        }

        if self.links.links[link_num].link_delayed {
            // The onset warning above already announced the drop; avoid
            // spamming one line per dropped frame while it stays delayed.
            return;
        }

        match &frame.body {
            WireMessage::Heartbeat { custom_mode, .. } => {
                if self.status.adopt_heartbeat_source(frame.src_system, frame.src_component) {
                    info!(
                        target_system = frame.src_system,
                        target_component = frame.src_component,
                        "adopted heartbeat source"
                    );
                }
                if self.status.heartbeat_error {
                    self.status.heartbeat_error = false;
                    info!("heartbeat OK");
                }
                if self.links.links[link_num].link_error {
                    self.links.links[link_num].link_error = false;
                    info!(link = link_num, "link OK");
                }
                let mode = flight_mode_name(*custom_mode);
                if self.status.flight_mode.as_deref() != Some(mode) {
                    self.status.flight_mode = Some(mode.to_string());
                    info!(mode, "flight mode changed");
                }
                self.links.links[link_num].last_heartbeat_wall = Some(std::time::Instant::now());
                self.status.last_heartbeat = Some(std::time::Instant::now());
            }
            WireMessage::ParamValue {
                param_id,
                param_value,
                param_index,
                param_count,
            } => {
                self.params.on_param_value(param_id, *param_value, *param_index, *param_count);
                apply_rc_limit_param(&mut self.rc_limits, param_id, *param_value);
                if let Some(req) = &self.param_set_inflight {
                    if req.matches(param_id) {
                        info!(name = %param_id, value = param_value, "param_set acknowledged");
                        self.param_set_inflight = None;
                    }
                }
            }
            WireMessage::ServoOutputRaw { servo_raw } => {
                self.control_mirror = recompute_control_mirror(
                    servo_raw,
                    &self.rc_limits,
                    self.settings.rc1mul as f64,
                    self.settings.rc2mul as f64,
                    self.settings.rc4mul as f64,
                    self.config.quadcopter,
                );
            }
            WireMessage::SysStatus { battery_remaining, .. } => {
                self.battery.on_sys_status(*battery_remaining);
            }
            WireMessage::ApAdc { adc2 } => {
                self.battery.on_ap_adc(*adc2, self.settings.numcells);
            }
            WireMessage::VfrHud { alt } => self.on_vfr_hud(*alt),
            WireMessage::GpsRaw { fix_type } => {
                self.status.gps_has_fix = *fix_type == 2;
            }
            WireMessage::RcChannelsRaw { chan_raw, .. } => {
                self.run_radio_setup(*chan_raw).await;
            }
            WireMessage::NavControllerOutput { wp_dist } => self.on_nav_controller_output(*wp_dist),
            WireMessage::WaypointCount { count } => {
                if self.waypoints.on_count(*count) {
                    self.request_waypoint(0).await;
                }
            }
            WireMessage::Waypoint { seq, x, y, z, command } => {
                let wp = crate::waypoint::Waypoint {
                    seq: *seq,
                    x: *x,
                    y: *y,
                    z: *z,
                    command: *command,
                };
                match self.waypoints.append(wp) {
                    AppendOutcome::NeedMore(next) => self.request_waypoint(next).await,
                    AppendOutcome::Done(op) => self.finish_waypoint_download(op).await,
                    AppendOutcome::OutOfOrder | AppendOutcome::Duplicate => {
                        debug!(seq, "dropped out-of-order/duplicate waypoint item");
                    }
                }
            }
            WireMessage::WaypointRequest { seq } => match self.waypoints.on_request(*seq) {
                UploadRequestOutcome::Send { seq, done } => {
                    self.send_waypoint_item(seq).await;
                    if done {
                        info!("waypoint upload complete");
                    }
                }
                UploadRequestOutcome::Abandoned => warn!("waypoint upload timed out, abandoning"),
                UploadRequestOutcome::BadSeq => warn!(seq, "waypoint request for out-of-range seq"),
                UploadRequestOutcome::NotUploading => {}
            },
            WireMessage::WaypointCurrent { seq } => {
                if self.status.last_waypoint_current != Some(*seq) {
                    self.status.last_waypoint_current = Some(*seq);
                    info!(seq, "waypoint");
                }
            }
            WireMessage::StatusText { severity, text } => {
                info!(severity = *severity, %text, "status text from vehicle");
            }
            _ => {}
        }

        self.status.record(&frame);
        self.forward_to_outputs(&frame).await;
    }

    /// VFR_HUD handler (§4.12): GPS-lock-gated altitude announcement
    /// relative to the base altitude, which auto-locks on first fix.
    fn on_vfr_hud(&mut self, alt: f32) {
        if !self.status.gps_has_fix || alt == 0.0 {
            return;
        }
        if self.settings.basealtitude == -1 {
            self.settings.basealtitude = alt as i64;
            self.status.last_announced_altitude = Some(0.0);
            info!(alt, "gps lock acquired");
            return;
        }
        let alt_i = alt as i64;
        if alt_i < self.settings.basealtitude {
            self.settings.basealtitude = alt_i;
        }
        if self.settings.altreadout <= 0 {
            return;
        }
        let last = self.status.last_announced_altitude.unwrap_or(0.0);
        if (alt as f64 - last).abs() >= self.settings.altreadout as f64 {
            self.status.last_announced_altitude = Some(alt as f64);
            let rounded =
                self.settings.altreadout * ((5 + alt_i - self.settings.basealtitude) / self.settings.altreadout);
            info!(height = rounded, "altitude");
        }
    }

    /// NAV_CONTROLLER_OUTPUT handler (§4.5): distance-to-waypoint readout,
    /// announced only in AUTO mode.
    fn on_nav_controller_output(&mut self, wp_dist: u16) {
        if self.status.flight_mode.as_deref() != Some("AUTO") || self.settings.distreadout == 0 {
            return;
        }
        let dist = wp_dist as i64;
        let rounded = (dist / self.settings.distreadout) * self.settings.distreadout;
        let last = self.status.last_announced_distance.unwrap_or(0);
        if (rounded - last).abs() >= self.settings.distreadout {
            if rounded != 0 {
                info!(distance = rounded, "waypoint distance");
            }
            self.status.last_announced_distance = Some(rounded);
        }
    }

    /// RC_CHANNELS_RAW handler's `radiosetup` branch (§4.5): widens each
    /// channel's `RCx_MIN`/`RCx_MAX` parameter whenever the live reading
    /// falls outside it, so calibration happens by waving the sticks.
    async fn run_radio_setup(&mut self, chan_raw: [u16; 8]) {
        if self.settings.radiosetup == 0 {
            return;
        }
        for (i, &v) in chan_raw.iter().enumerate() {
            let channel = i + 1;
            let v = v as f32;
            let min_name = format!("RC{channel}_MIN");
            let rcmin = self.params.values.get(&min_name).copied().unwrap_or(0.0);
            if rcmin > v {
                info!(channel, value = v, "widening RC_MIN");
                let frame = self.envelope(WireMessage::ParamSet {
                    param_id: min_name,
                    param_value: v,
                });
                self.send_to_master(&frame).await;
            }
            let max_name = format!("RC{channel}_MAX");
            let rcmax = self.params.values.get(&max_name).copied().unwrap_or(0.0);
            if rcmax < v {
                info!(channel, value = v, "widening RC_MAX");
                let frame = self.envelope(WireMessage::ParamSet {
                    param_id: max_name,
                    param_value: v,
                });
                self.send_to_master(&frame).await;
            }
        }
    }

    async fn forward_to_outputs(&mut self, frame: &Frame) {
        if self.settings.mavfwd == 0 {
            return;
        }
        for output in &mut self.outputs {
            if let Ok(bytes) = output.codec.encode(frame) {
                let _ = output.transport.send(&bytes).await;
            }
        }
    }

    async fn send_to_master(&mut self, frame: &Frame) {
        let idx = self.links.current_master_index();
        if let Ok(bytes) = self.links.links[idx].codec.encode(frame) {
            let _ = self.links.links[idx].transport.send(&bytes).await;
        }
    }

    fn envelope(&self, body: WireMessage) -> Frame {
        Frame {
            src_system: self.config.source_system,
            src_component: self.config.source_component,
            usec: None,
            body,
        }
    }

    async fn request_waypoint(&mut self, seq: u16) {
        let frame = self.envelope(WireMessage::WaypointRequest { seq });
        self.send_to_master(&frame).await;
    }

    async fn send_waypoint_item(&mut self, seq: u16) {
        if let Some(wp) = self.waypoints.wp(seq).cloned() {
            let frame = self.envelope(WireMessage::Waypoint {
                seq: wp.seq,
                x: wp.x,
                y: wp.y,
                z: wp.z,
                command: wp.command,
            });
            self.send_to_master(&frame).await;
        }
    }

    async fn finish_waypoint_download(&mut self, op: Option<WaypointOp>) {
        info!(count = self.waypoints.count(), "waypoint download complete");
        if op == Some(WaypointOp::Save) {
            if let Some(_path) = self.waypoints.save_filename.take() {
                // Writing the saved file to disk is an external-file concern
                // handled by the operator-command layer, not the engine.
            }
        }
    }

    /// §4.7's table, run once per trigger that came due this tick. The
    /// caller only invokes this while the scheduler is active (§4.7:
    /// skipped entirely in setup mode or before a target system is known).
    async fn run_scheduled(&mut self, due: crate::scheduler::Due) {
        if due.heartbeat && self.settings.heartbeat != 0 {
            let frame = self.envelope(WireMessage::Heartbeat {
                base_mode: 0,
                custom_mode: 0,
                autopilot: 0,
            });
            self.send_to_master(&frame).await;
        }

        if due.heartbeat_check {
            if let Some(last) = self.status.last_heartbeat {
                if last.elapsed() > Duration::from_secs(5) && !self.status.heartbeat_error {
                    warn!("no heartbeat received recently");
                    self.status.heartbeat_error = true;
                }
            }
            for link in &mut self.links.links {
                if !link.link_error && link.last_heartbeat_wall.map(|t| t.elapsed() > Duration::from_secs(5)).unwrap_or(false) {
                    warn!(link = link.link_num, "link down");
                    link.link_error = true;
                }
            }
        }

        if due.streamrate {
            debug!(rate = self.settings.streamrate, "requesting data stream rate");
        }

        if due.battery {
            if let Some((pct, is_warning)) = self.battery.maybe_announce() {
                if is_warning {
                    warn!(percent = pct, "flight battery low");
                } else {
                    info!(percent = pct, "flight battery");
                }
            }
        }

        if due.override_tick {
            if let Some(sitl) = &mut self.sitl {
                let _ = sitl.send(&self.overrides).await;
            } else if !self.overrides.is_all_zero() {
                let frame = self.envelope(WireMessage::RcChannelsOverride {
                    chan_raw: self.overrides.0,
                });
                self.send_to_master(&frame).await;
            }
        }

        if due.status_snapshot {
            debug!(
                target_system = self.status.target_system,
                target_component = self.status.target_component,
                "periodic status snapshot"
            );
            if let Some(journal) = &self.journal {
                journal.enqueue_status(self.status_snapshot_text());
            }
        }

        if let Some(req) = &mut self.param_set_inflight {
            if req.attempt_timed_out() {
                if req.retry() {
                    let frame = self.envelope(WireMessage::ParamSet {
                        param_id: req.name.clone(),
                        param_value: req.value,
                    });
                    self.send_to_master(&frame).await;
                } else {
                    warn!(name = %req.name, "param_set abandoned after repeated timeouts");
                    self.param_set_inflight = None;
                }
            }
        }
    }

    /// Reads one operator line (§6). In setup mode, every non-`.` line is
    /// written verbatim to the current master as raw bytes rather than
    /// parsed.
    async fn handle_operator_line(&mut self, line: &str) {
        if self.status.setup_mode {
            if line.trim() == "." {
                self.status.setup_mode = false;
                info!("exiting setup mode");
            } else {
                let idx = self.links.current_master_index();
                let _ = self.links.links[idx].transport.send(line.as_bytes()).await;
            }
            return;
        }

        let cmd = crate::operator::parse_line(line);
        self.execute_operator(cmd).await;
    }

    async fn execute_operator(&mut self, cmd: OperatorCommand) {
        match cmd {
            OperatorCommand::Switch(n) => {
                self.links.preferred_link = n as usize;
                info!(link = n, "preferred link switched");
            }
            OperatorCommand::Rc { channel, pwm } => {
                let value = if pwm < 0 { 0xFFFF } else { pwm as u16 };
                self.overrides.set_channel(channel as usize, value);
            }
            OperatorCommand::WpList => {
                self.waypoints.begin_download(WaypointOp::List, None);
                self.request_wp_count().await;
            }
            OperatorCommand::WpSave(file) => {
                self.waypoints.begin_download(WaypointOp::Save, Some(file));
                self.request_wp_count().await;
            }
            OperatorCommand::WpLoad(file) => match load_trivial_waypoint_file(&file) {
                Ok(waypoints) => {
                    let count = waypoints.len() as u16;
                    self.waypoints.begin_upload(waypoints);
                    let clear = self.envelope(WireMessage::WaypointClearAll);
                    self.send_to_master(&clear).await;
                    let frame = self.envelope(WireMessage::WaypointCount { count });
                    self.send_to_master(&frame).await;
                    info!(%file, count, "waypoint upload started");
                }
                Err(err) => warn!(%file, error = %err, "failed to load waypoint file"),
            },
            OperatorCommand::WpSet(seq) => {
                let frame = self.envelope(WireMessage::WaypointCurrent { seq });
                self.send_to_master(&frame).await;
            }
            OperatorCommand::WpClear => {
                self.waypoints.waypoints.clear();
            }
            OperatorCommand::ParamFetch => {
                self.params = ParamTable::default();
                debug!("requesting full parameter list");
            }
            OperatorCommand::ParamSet { name, value } => {
                self.param_set_inflight = Some(ParamSetRequest::new(name.clone(), value));
                let frame = self.envelope(WireMessage::ParamSet {
                    param_id: name,
                    param_value: value,
                });
                self.send_to_master(&frame).await;
            }
            OperatorCommand::ParamShow => {
                for (name, value) in &self.params.values {
                    info!(%name, value, "param");
                }
            }
            OperatorCommand::ParamSave(_file) | OperatorCommand::ParamLoad(_file) => {
                warn!("param file persistence is out of scope for this engine");
            }
            OperatorCommand::Setup => {
                self.status.setup_mode = true;
                info!("entering setup mode; send '.' to exit");
            }
            OperatorCommand::SetupExit => {
                self.status.setup_mode = false;
            }
            OperatorCommand::SetupLine(line) => {
                let idx = self.links.current_master_index();
                let _ = self.links.links[idx].transport.send(line.as_bytes()).await;
            }
            OperatorCommand::Reset => {
                self.status = StatusMirror::default();
                info!("status mirror reset");
            }
            OperatorCommand::Status(_field) => {
                info!(
                    target_system = self.status.target_system,
                    target_component = self.status.target_component,
                    "status"
                );
            }
            OperatorCommand::Trim => {
                debug!("trim requested (no-op: RC trim capture is vehicle-side)");
            }
            OperatorCommand::Mode(mode) => {
                let custom_mode = match mode {
                    FlightModeCommand::Auto => 0,
                    FlightModeCommand::Manual => 1,
                    FlightModeCommand::Loiter => 2,
                    FlightModeCommand::Rtl => 3,
                    FlightModeCommand::Ground => 4,
                };
                let frame = self.envelope(WireMessage::SetMode {
                    base_mode: 1,
                    custom_mode,
                });
                self.send_to_master(&frame).await;
            }
            OperatorCommand::Set { name: Some(name), value: Some(value) } => {
                if !self.settings.set(&name, value) {
                    warn!(%name, "unknown setting");
                }
            }
            OperatorCommand::Set { name: Some(name), value: None } => {
                match self.settings.get(&name) {
                    Some(v) => info!(%name, value = v, "setting"),
                    None => warn!(%name, "unknown setting"),
                }
            }
            OperatorCommand::Set { name: None, .. } => {
                for (name, value) in self.settings.all() {
                    info!(%name, value, "setting");
                }
            }
            OperatorCommand::Bat => {
                info!(
                    flight = ?self.battery.flight_battery,
                    avionics = ?self.battery.avionics_battery,
                    "battery"
                );
            }
            OperatorCommand::Link => {
                for link in &self.links.links {
                    info!(
                        link = link.link_num,
                        errored = link.link_error,
                        delayed = link.link_delayed,
                        messages_in = link.messages_in,
                        "link"
                    );
                }
            }
            OperatorCommand::Up(amount) => {
                let delta = amount.unwrap_or(1.0);
                debug!(delta, "altitude nudge requested (no-op: no active command channel)");
            }
            OperatorCommand::Arm => {
                let frame = self.envelope(WireMessage::CommandArmDisarm { arm: true });
                self.send_to_master(&frame).await;
            }
            OperatorCommand::Disarm => {
                let frame = self.envelope(WireMessage::CommandArmDisarm { arm: false });
                self.send_to_master(&frame).await;
            }
            OperatorCommand::Accelcal | OperatorCommand::CompassCal => {
                debug!("calibration commands are out of scope for this engine");
            }
            OperatorCommand::Help => {
                info!("available commands: switch, rc, wp, param, setup, reset, status, trim, auto/manual/loiter/rtl/ground, set, bat, link, up, arm, disarm");
            }
            OperatorCommand::Unknown(line) => {
                warn!(%line, "unrecognized command");
            }
            OperatorCommand::Empty => {}
        }
    }

    async fn request_wp_count(&mut self) {
        let frame = self.envelope(WireMessage::WaypointCount { count: 0 });
        self.send_to_master(&frame).await;
    }

    /// Renders the §4.8 `status.txt` snapshot: target identity, flight mode,
    /// error tally, and per-link health.
    fn status_snapshot_text(&self) -> String {
        let mut out = format!(
            "target_system={} target_component={} flight_mode={} mav_error={}\n",
            self.status.target_system,
            self.status.target_component,
            self.status.flight_mode.as_deref().unwrap_or("?"),
            self.status.mav_error,
        );
        for link in &self.links.links {
            out.push_str(&format!(
                "link{} error={} delayed={} messages_in={}\n",
                link.link_num + 1,
                link.link_error,
                link.link_delayed,
                link.messages_in,
            ));
        }
        out
    }
}

/// Folds a `RC{n}_MIN`/`RC{n}_MAX` parameter into the live [`RcLimits`]; any
/// other parameter name is ignored. This is the only place those limits are
/// ever populated (§4.5's `radiosetup` loop and manual param fetches both
/// feed it the same way).
fn apply_rc_limit_param(limits: &mut RcLimits, param_id: &str, value: f32) {
    let Some(rest) = param_id.strip_prefix("RC") else { return };
    let (channel, suffix) = match rest.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => rest.split_at(idx),
        None => return,
    };
    let Ok(channel) = channel.parse::<usize>() else { return };
    if channel == 0 || channel > 8 {
        return;
    }
    match suffix {
        "_MIN" => limits.min[channel] = value as f64,
        "_MAX" => limits.max[channel] = value as f64,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::UdpTransport;

    async fn test_engine() -> Engine {
        let t0 = UdpTransport::bind("127.0.0.1:0", false).await.unwrap();
        let link = Link::new(0, Box::new(t0));
        let links = LinkSet::new(vec![link], 1);
        Engine::new(
            EngineConfig {
                source_system: 255,
                source_component: 0,
                aircraft: None,
                mav10: false,
                quadcopter: false,
            },
            links,
            Vec::new(),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn heartbeat_adopts_target_system() {
        let mut engine = test_engine().await;
        let frame = Frame {
            src_system: 7,
            src_component: 1,
            usec: None,
            body: WireMessage::Heartbeat {
                base_mode: 0,
                custom_mode: 0,
                autopilot: 3,
            },
        };
        engine.dispatch(0, frame).await;
        assert_eq!(engine.status.target_system, 7);
        assert_eq!(engine.status.target_component, 1);
    }

    #[tokio::test]
    async fn switch_command_updates_preferred_link() {
        let mut engine = test_engine().await;
        engine.execute_operator(OperatorCommand::Switch(1)).await;
        assert_eq!(engine.links.preferred_link, 1);
    }

    #[tokio::test]
    async fn rc_command_updates_override_vector() {
        let mut engine = test_engine().await;
        engine
            .execute_operator(OperatorCommand::Rc { channel: 3, pwm: 1500 })
            .await;
        assert_eq!(engine.overrides.0[2], 1500);
    }

    #[tokio::test]
    async fn set_command_mutates_named_setting() {
        let mut engine = test_engine().await;
        engine
            .execute_operator(OperatorCommand::Set {
                name: Some("streamrate".to_string()),
                value: Some(7),
            })
            .await;
        assert_eq!(engine.settings.streamrate, 7);
    }

    #[tokio::test]
    async fn bad_data_counts_against_mav_error_and_does_not_panic() {
        let mut engine = test_engine().await;
        let frame = Frame {
            src_system: 0,
            src_component: 0,
            usec: None,
            body: WireMessage::BadData { bytes: vec![1, 2, 3] },
        };
        engine.dispatch(0, frame).await;
        assert_eq!(engine.status.mav_error, 1);
    }

    #[tokio::test]
    async fn heartbeat_clears_link_error() {
        let mut engine = test_engine().await;
        engine.links.links[0].link_error = true;
        let frame = Frame {
            src_system: 7,
            src_component: 1,
            usec: None,
            body: WireMessage::Heartbeat {
                base_mode: 0,
                custom_mode: 3,
                autopilot: 3,
            },
        };
        engine.dispatch(0, frame).await;
        assert!(!engine.links.links[0].link_error);
        assert_eq!(engine.status.flight_mode.as_deref(), Some("AUTO"));
    }

    #[tokio::test]
    async fn delayed_link_frames_are_dropped_before_dispatch() {
        let mut engine = test_engine().await;
        engine.links.links[0].link_delayed = true;
        let frame = Frame {
            src_system: 7,
            src_component: 1,
            usec: None,
            body: WireMessage::Heartbeat {
                base_mode: 0,
                custom_mode: 0,
                autopilot: 3,
            },
        };
        engine.dispatch(0, frame).await;
        assert_eq!(engine.status.target_system, -1);
    }

    #[tokio::test]
    async fn param_set_command_sends_param_set_not_param_value() {
        let mut engine = test_engine().await;
        engine
            .execute_operator(OperatorCommand::ParamSet {
                name: "RC3_MIN".to_string(),
                value: 1000.0,
            })
            .await;
        assert!(engine.param_set_inflight.is_some());
    }

    #[test]
    fn rc_limit_param_populates_limits() {
        let mut limits = RcLimits::default();
        apply_rc_limit_param(&mut limits, "RC3_MIN", 1000.0);
        apply_rc_limit_param(&mut limits, "RC3_MAX", 2000.0);
        apply_rc_limit_param(&mut limits, "ALTREADOUT", 5.0);
        assert_eq!(limits.min[3], 1000.0);
        assert_eq!(limits.max[3], 2000.0);
    }

    #[tokio::test]
    async fn wp_load_reads_trivial_file_and_starts_upload() {
        let mut engine = test_engine().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wps.txt");
        std::fs::write(&path, "0 1.0 2.0 3.0 16\n1 4.0 5.0 6.0 16\n").unwrap();
        engine
            .execute_operator(OperatorCommand::WpLoad(path.to_str().unwrap().to_string()))
            .await;
        assert!(engine.waypoints.is_uploading());
        assert_eq!(engine.waypoints.count(), 2);
    }
}
