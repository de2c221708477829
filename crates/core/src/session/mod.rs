//! Per-song playback and editing session.
//!
//! A session owns everything that belongs to one loaded chart: the conductor,
//! the editor (and through it the timeline) and the audio transport. Nothing
//! here is global; tests and tools can run as many sessions as they like.

use tracing::{debug, trace};

use crate::{
    chart::{ChartFile, Manifest},
    conductor::validate_bpm,
    config::AppConfig,
    editor::{Command, CommandOutcome, Editor, HistoryOutcome},
    resolve::{active_instance, PresentationState},
    schema::EventKind,
    signal::Signal,
    transport::Transport,
    Conductor, ConductorTick, ListenerId, Result, Stamp,
};

/// Everything one [`Session::update`] produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub tick: ConductorTick,
    /// Stamps crossed this frame, in time order.
    pub stamps: Vec<Stamp>,
    /// Tempo applied from a `bpm-change` event this frame.
    pub tempo: Option<f64>,
}

pub struct Session<T: Transport> {
    manifest: Manifest,
    conductor: Conductor,
    editor: Editor,
    transport: T,
    playback_rate: f64,
    /// Song time up to which stamps have already been reported.
    reported_until: f64,
    stamp_hit: Signal<Stamp>,
}

impl<T: Transport> Session<T> {
    /// Loads `chart` against `transport`. Playback starts with the configured
    /// count-in; the transport stays paused until it finishes.
    pub fn new(chart: &ChartFile, mut transport: T, config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let mut conductor = chart.conductor(config.conductor.pre_roll_beats)?;
        conductor.set_song_duration(transport.duration());
        let timeline = chart.timeline(&conductor);
        let editor = Editor::new(timeline, &config.editor);

        transport.seek(0.0);
        transport.set_paused(conductor.in_pre_roll());
        transport.set_speed(config.playback.playback_rate);
        debug!(
            name = %chart.manifest.name,
            duration = transport.duration(),
            "session started"
        );

        let mut session = Self {
            manifest: chart.manifest.clone(),
            conductor,
            editor,
            transport,
            playback_rate: config.playback.playback_rate,
            reported_until: f64::NEG_INFINITY,
            stamp_hit: Signal::new(),
        };
        session.sync_tempo()?;
        Ok(session)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn conductor(&self) -> &Conductor {
        &self.conductor
    }

    /// Mutable conductor access for registering beat and step listeners.
    pub fn conductor_mut(&mut self) -> &mut Conductor {
        &mut self.conductor
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Called with every note or event the playhead crosses.
    pub fn on_stamp_hit<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&Stamp) + 'static,
    {
        self.stamp_hit.connect(listener)
    }

    pub fn disconnect_stamp_hit(&mut self, id: ListenerId) -> bool {
        self.stamp_hit.disconnect(id)
    }

    /// Advances one frame of `dt` wall-clock seconds.
    ///
    /// Beat and step notifications fire first, then stamp hits. A stamp is
    /// hit once the playhead reaches the step it snaps to. Tempo and speed
    /// events take effect after the stamps of this frame.
    pub fn update(&mut self, dt: f64) -> Result<FrameReport> {
        let mut report = FrameReport::default();
        if self.conductor.is_paused() {
            return Ok(report);
        }

        let was_pre_roll = self.conductor.in_pre_roll();
        report.tick = self
            .conductor
            .tick(self.transport.time(), dt * self.transport.speed());

        if was_pre_roll {
            if report.tick.started {
                self.transport.seek(self.conductor.elapsed());
                self.transport.set_paused(false);
                report.tempo = self.sync_tempo()?;
                debug!("playback started");
            }
            return Ok(report);
        }

        let horizon = self
            .conductor
            .step_to_time(self.conductor.current_step() as f64 + 0.5);
        if horizon > self.reported_until {
            report.stamps = self
                .editor
                .timeline()
                .stamps_between(self.reported_until, horizon);
            for stamp in &report.stamps {
                trace!(id = %stamp.id(), time = stamp.time(), "stamp hit");
                self.stamp_hit.emit(stamp);
            }
            self.reported_until = horizon;
        }

        report.tempo = self.sync_tempo()?;
        self.sync_speed();
        Ok(report)
    }

    /// Jumps to `seconds` without reporting beats, steps or stamps. Stamps
    /// at or after the target fire as playback reaches them. Seeking out of
    /// the count-in starts the transport.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let seconds = seconds.clamp(0.0, self.transport.duration().max(0.0));
        self.transport.seek(seconds);
        self.conductor.seek(seconds);
        if !self.conductor.is_paused() && !self.conductor.in_pre_roll() {
            self.transport.set_paused(false);
        }
        self.reported_until = self.conductor.elapsed();
        self.sync_tempo()?;
        self.sync_speed();
        Ok(())
    }

    pub fn pause(&mut self) {
        self.conductor.pause();
        self.transport.set_paused(true);
    }

    pub fn resume(&mut self) {
        self.conductor.resume();
        if !self.conductor.in_pre_roll() {
            self.transport.set_paused(false);
        }
    }

    /// Effective event-driven state at the playhead.
    pub fn presentation(&self) -> PresentationState {
        PresentationState::at(
            self.conductor.elapsed().max(0.0),
            self.editor.timeline().events(),
        )
    }

    /// Applies an editor command against the current step grid. Undoing or
    /// redoing a tempo edit moves the manifest tempo with it.
    pub fn apply(&mut self, command: Command) -> Result<CommandOutcome> {
        let outcome = self.editor.apply(command, &mut self.conductor)?;
        if let CommandOutcome::History(HistoryOutcome::TempoRestored(bpm)) = outcome {
            self.manifest.initial_bpm = bpm;
        }
        self.sync_tempo()?;
        Ok(outcome)
    }

    /// Editor access for gestures, which need the conductor alongside.
    pub fn editor_mut(&mut self) -> (&mut Editor, &mut Conductor) {
        (&mut self.editor, &mut self.conductor)
    }

    /// Changes the chart's base tempo. Returns how many stacked notes the
    /// new grid evicted.
    ///
    /// While a `bpm-change` is active the grid in effect is the event's, so
    /// only the manifest changes and nothing is swept.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<usize> {
        validate_bpm(bpm)?;
        if self.tempo_event_bpm().is_some() {
            self.manifest.initial_bpm = bpm;
            debug!(bpm, "base tempo changed under a tempo event");
            return Ok(0);
        }
        let evicted = self.editor.set_bpm(&mut self.conductor, bpm)?;
        self.manifest.initial_bpm = bpm;
        Ok(evicted)
    }

    /// Current chart contents, ready to be saved.
    pub fn to_chart(&self) -> ChartFile {
        let mut chart = ChartFile::new(self.manifest.clone());
        chart.store_timeline(self.editor.timeline());
        chart
    }

    /// Stops the transport and hands back the chart.
    pub fn finish(mut self) -> ChartFile {
        self.transport.stop();
        debug!(name = %self.manifest.name, "session finished");
        self.to_chart()
    }

    /// Applies the tempo of the active `bpm-change`, or the manifest tempo
    /// before the first one.
    fn sync_tempo(&mut self) -> Result<Option<f64>> {
        let bpm = self.tempo_event_bpm().unwrap_or(self.manifest.initial_bpm);
        if bpm == self.conductor.bpm() {
            return Ok(None);
        }
        self.conductor.set_bpm(bpm)?;
        Ok(Some(bpm))
    }

    /// Tempo of the `bpm-change` active at the playhead.
    fn tempo_event_bpm(&self) -> Option<f64> {
        let at = self.conductor.elapsed().max(0.0);
        active_instance(EventKind::BpmChange, at, self.editor.timeline().events())
            .and_then(|event| event.params().number("bpm"))
    }

    fn sync_speed(&mut self) {
        let speed = self.presentation().playback_speed * self.playback_rate;
        if speed != self.transport.speed() {
            self.transport.set_speed(speed);
        }
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("manifest", &self.manifest.name)
            .field("conductor", &self.conductor)
            .field("transport", &self.transport)
            .field("reported_until", &self.reported_until)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        schema::ParamValue,
        transport::SimulatedTransport,
        ChartEvent, ChartNote, Move,
    };

    const FRAME: f64 = 1.0 / 64.0;

    fn chart(notes: Vec<ChartNote>, events: Vec<ChartEvent>) -> ChartFile {
        let mut chart = ChartFile::new(Manifest::new("Test", "Tester", 120.0));
        chart.chart.notes = notes;
        chart.chart.events = events;
        chart
    }

    fn config(pre_roll_beats: u32) -> AppConfig {
        let mut config = AppConfig::default();
        config.conductor.pre_roll_beats = pre_roll_beats;
        config
    }

    fn run(session: &mut Session<SimulatedTransport>, seconds: f64) -> Vec<FrameReport> {
        let frames = (seconds / FRAME).round() as usize;
        (0..frames)
            .map(|_| {
                session.transport_mut().advance(FRAME);
                session.update(FRAME).unwrap()
            })
            .collect()
    }

    #[test]
    fn example_chart_totals() {
        let session = Session::new(&chart(vec![], vec![]), SimulatedTransport::new(60.0), &config(0)).unwrap();
        let conductor = session.conductor();
        assert_abs_diff_eq!(conductor.beat_interval(), 0.5);
        assert_abs_diff_eq!(conductor.step_interval(), 0.125);
        assert_abs_diff_eq!(conductor.total_beats(), 120.0);
        assert_abs_diff_eq!(conductor.total_steps(), 480.0);
    }

    #[test]
    fn count_in_holds_transport_then_starts_it() {
        let mut session =
            Session::new(&chart(vec![], vec![]), SimulatedTransport::new(10.0), &config(2)).unwrap();
        assert!(session.transport().is_paused());

        let reports = run(&mut session, 0.5);
        assert!(session.transport().is_paused());
        assert_eq!(reports.iter().filter(|r| r.tick.count_in.is_some()).count(), 1);

        let reports = run(&mut session, 0.75);
        assert!(reports.iter().any(|r| r.tick.started));
        assert!(!session.transport().is_paused());
        assert!(!session.conductor().in_pre_roll());
    }

    #[test]
    fn stamps_fire_once_in_order_including_step_zero() {
        let notes = vec![
            ChartNote::new(0.0, Move::Left, None),
            ChartNote::new(0.5, Move::Up, None),
            ChartNote::new(1.0, Move::Right, None),
        ];
        let mut session = Session::new(&chart(notes, vec![]), SimulatedTransport::new(10.0), &config(0)).unwrap();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let sink = hits.clone();
        session.on_stamp_hit(move |stamp| sink.borrow_mut().push(stamp.time()));

        run(&mut session, 1.25);
        assert_eq!(*hits.borrow(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn seeking_backward_does_not_replay_and_replays_after_passing_again() {
        let notes = vec![ChartNote::new(1.0, Move::Down, None)];
        let mut session = Session::new(&chart(notes, vec![]), SimulatedTransport::new(10.0), &config(0)).unwrap();
        let hits = Rc::new(RefCell::new(0));
        let sink = hits.clone();
        session.on_stamp_hit(move |_| *sink.borrow_mut() += 1);

        run(&mut session, 1.5);
        assert_eq!(*hits.borrow(), 1);

        session.seek(0.5).unwrap();
        let report = session.update(0.0).unwrap();
        assert!(report.tick.is_empty());
        assert!(report.stamps.is_empty());

        run(&mut session, 1.0);
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn bpm_change_events_drive_the_conductor() {
        let mut params = EventKind::BpmChange.default_params();
        params.set("bpm", ParamValue::Number(240.0)).unwrap();
        let events = vec![ChartEvent::with_params(1.0, params)];
        let mut session = Session::new(&chart(vec![], events), SimulatedTransport::new(10.0), &config(0)).unwrap();

        let reports = run(&mut session, 1.5);
        assert_eq!(reports.iter().filter_map(|r| r.tempo).collect::<Vec<_>>(), vec![240.0]);
        assert_eq!(session.conductor().bpm(), 240.0);

        session.seek(0.25).unwrap();
        assert_eq!(session.conductor().bpm(), 120.0);
    }

    #[test]
    fn speed_events_retune_the_transport() {
        let mut params = EventKind::ChangeSpeed.default_params();
        params.set("speed", ParamValue::Number(2.0)).unwrap();
        let events = vec![ChartEvent::with_params(0.5, params)];
        let mut session = Session::new(&chart(vec![], events), SimulatedTransport::new(10.0), &config(0)).unwrap();

        run(&mut session, 0.25);
        assert_eq!(session.transport().speed(), 1.0);
        run(&mut session, 0.5);
        assert_eq!(session.transport().speed(), 2.0);
    }

    #[test]
    fn pause_freezes_everything() {
        let mut session =
            Session::new(&chart(vec![], vec![]), SimulatedTransport::new(10.0), &config(0)).unwrap();
        run(&mut session, 0.5);
        session.pause();
        let before = session.conductor().elapsed();

        let reports = run(&mut session, 1.0);
        assert!(reports.iter().all(|r| r.tick.is_empty()));
        assert_eq!(session.conductor().elapsed(), before);

        session.resume();
        assert!(!session.transport().is_paused());
    }

    #[test]
    fn edits_flow_into_playback_and_back_to_the_chart() {
        let mut session =
            Session::new(&chart(vec![], vec![]), SimulatedTransport::new(10.0), &config(0)).unwrap();
        session
            .apply(Command::PlaceNote { step: 16, lane: Move::Up })
            .unwrap();
        {
            let (editor, conductor) = session.editor_mut();
            editor.begin_place(4, Move::Left, conductor).unwrap();
            editor.commit().unwrap();
        }

        let stamps: Vec<_> = run(&mut session, 2.25)
            .into_iter()
            .flat_map(|report| report.stamps)
            .collect();
        assert_eq!(stamps.len(), 2);

        let chart = session.finish();
        assert_eq!(chart.chart.notes.len(), 2);
        assert_abs_diff_eq!(chart.chart.notes[1].time, 2.0);
    }

    #[test]
    fn seeking_out_of_the_count_in_starts_playback() {
        let notes = vec![ChartNote::new(2.0, Move::Up, None)];
        let mut session = Session::new(&chart(notes, vec![]), SimulatedTransport::new(10.0), &config(4)).unwrap();
        let hits = Rc::new(RefCell::new(0));
        let sink = hits.clone();
        session.on_stamp_hit(move |_| *sink.borrow_mut() += 1);

        session.update(0.1).unwrap();
        assert!(session.transport().is_paused());
        session.seek(1.0).unwrap();
        assert!(!session.transport().is_paused());

        run(&mut session, 200.0 * FRAME);
        assert_eq!(*hits.borrow(), 1);
        assert!(session.conductor().elapsed() > 2.0);
    }

    #[test]
    fn off_grid_stamps_ahead_of_a_seek_still_fire() {
        let notes = vec![
            ChartNote::new(0.9, Move::Left, None),
            ChartNote::new(1.05, Move::Right, None),
        ];
        let mut session = Session::new(&chart(notes, vec![]), SimulatedTransport::new(10.0), &config(0)).unwrap();

        session.seek(1.01).unwrap();
        let fired: Vec<_> = run(&mut session, 0.5)
            .into_iter()
            .flat_map(|report| report.stamps)
            .map(|stamp| stamp.time())
            .collect();
        assert_eq!(fired, vec![1.05]);
    }

    #[test]
    fn base_tempo_under_a_tempo_event_sweeps_nothing() {
        let mut params = EventKind::BpmChange.default_params();
        params.set("bpm", ParamValue::Number(60.0)).unwrap();
        let events = vec![ChartEvent::with_params(0.0, params)];
        let notes = vec![
            ChartNote::new(0.25, Move::Left, None),
            ChartNote::new(0.375, Move::Right, None),
        ];
        let mut session = Session::new(&chart(notes, events), SimulatedTransport::new(10.0), &config(0)).unwrap();
        assert_eq!(session.conductor().bpm(), 60.0);

        assert_eq!(session.set_bpm(30.0).unwrap(), 0);
        assert_eq!(session.editor().timeline().notes().len(), 2);
        assert_eq!(session.manifest().initial_bpm, 30.0);
        assert_eq!(session.conductor().bpm(), 60.0);
        assert!(session.set_bpm(f64::NAN).is_err());
    }

    #[test]
    fn undoing_a_tempo_edit_restores_the_manifest_tempo() {
        let notes = vec![
            ChartNote::new(0.25, Move::Left, None),
            ChartNote::new(0.375, Move::Right, None),
        ];
        let mut session = Session::new(&chart(notes, vec![]), SimulatedTransport::new(10.0), &config(0)).unwrap();

        assert_eq!(session.set_bpm(30.0).unwrap(), 1);
        assert_eq!(session.manifest().initial_bpm, 30.0);

        assert_eq!(
            session.apply(Command::Undo).unwrap(),
            CommandOutcome::History(HistoryOutcome::TempoRestored(120.0))
        );
        assert_eq!(session.manifest().initial_bpm, 120.0);
        assert_eq!(session.conductor().bpm(), 120.0);
        assert_eq!(session.editor().timeline().notes().len(), 2);
        assert_eq!(session.to_chart().manifest.initial_bpm, 120.0);
    }

    #[test]
    fn rejects_invalid_manifest_tempo() {
        let mut bad = chart(vec![], vec![]);
        bad.manifest.initial_bpm = 0.0;
        assert!(Session::new(&bad, SimulatedTransport::new(1.0), &config(0)).is_err());
    }
}
