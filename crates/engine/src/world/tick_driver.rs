use super::World;
use super::hook::{MutationContext, MutationKind};
use super::position::ChunkPos;
use crate::error::WorldError;
use std::time::{SystemTime, UNIX_EPOCH};

/// Light drains allowed before a forced save gives up on settling light.
const SAVE_LIGHT_PASSES: usize = 64;

/// Summary of one world tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// World time after the tick.
    pub time: u64,
    /// Scheduled ticks whose behavior ran.
    pub scheduled_run: usize,
    pub scheduled_pending: usize,
    pub light_pending: usize,
    pub chunks_unloaded: usize,
    pub chunks_saved: usize,
    pub night_skipped: bool,
}

impl World {
    /// Advance the simulation by one tick.
    ///
    /// A chunk failure latched by a write during this or an earlier tick is
    /// returned as an error; the world state stays consistent and the caller
    /// decides whether to continue.
    pub fn tick(&mut self) -> Result<TickReport, WorldError> {
        if let Some(err) = self.fault.take() {
            return Err(err);
        }
        let mut report = TickReport::default();

        self.update_weather();

        self.advance_sleepers();
        if self.all_players_asleep() {
            self.skip_night();
            report.night_skipped = true;
        }

        report.chunks_unloaded = self.unload_unused_chunks()?;
        self.sky_subtracted = self.calculate_sky_subtracted();

        let next = self.data.time + 1;
        if self.config.autosave_interval > 0 && next % self.config.autosave_interval == 0 {
            report.chunks_saved = self.save(false, None)?;
        }
        self.set_time(next);

        report.scheduled_run = self.drain_scheduled(false);
        self.tick_random_blocks();
        self.update_lighting();

        for observer in &mut self.observers {
            observer.tick_finished(next);
        }

        if let Some(err) = self.fault.take() {
            return Err(err);
        }
        report.time = self.data.time;
        report.scheduled_pending = self.ticks.len();
        report.light_pending = self.light.len();
        tracing::debug!(
            "tick {}: {} scheduled ran, {} light pending, {} chunks unloaded",
            report.time,
            report.scheduled_run,
            report.light_pending,
            report.chunks_unloaded
        );
        Ok(report)
    }

    /// Evict chunks no player has been near for the grace period, at most
    /// 100 per call. The veto hook may keep a chunk loaded. Non-player
    /// entities inside an evicted chunk are dropped with it.
    pub fn unload_unused_chunks(&mut self) -> Result<usize, WorldError> {
        let now = self.data.time;
        let anchors: Vec<ChunkPos> = self.players().map(|(_, p)| p.chunk()).collect();
        self.store.queue_unused(
            now,
            &anchors,
            self.config.view_radius,
            self.data.spawn.chunk(),
            self.config.spawn_keep_radius,
            self.config.unload_grace_ticks,
        );

        let mut unloaded = 0;
        for pos in self.store.take_unload_batch() {
            let origin = pos.block_origin(0);
            let ctx = MutationContext::new(self.get_block(origin));
            if !self.allows(MutationKind::ChunkUnload, origin, &ctx) {
                if let Some(chunk) = self.store.chunk_mut(pos) {
                    chunk.last_seen = now;
                }
                continue;
            }
            let doomed: Vec<_> = self
                .store
                .chunk(pos)
                .map(|c| c.entities.iter().copied().collect())
                .unwrap_or_default();
            if self.store.unload(pos, now)? {
                for id in doomed {
                    if self.entities.get(id).is_some_and(|e| !e.is_player()) {
                        self.entities.remove(id);
                    }
                }
                unloaded += 1;
            }
        }
        if unloaded > 0 {
            tracing::debug!("unloaded {} chunks, {} still loaded", unloaded, self.store.len());
        }
        Ok(unloaded)
    }

    /// Save world metadata and chunks. A forced save settles pending light
    /// first, writes every chunk that needs it and flushes the storage; a
    /// regular save writes a bounded batch. Returns the chunks written.
    pub fn save(&mut self, force: bool, progress: Option<&mut dyn FnMut(u8)>) -> Result<usize, WorldError> {
        if force {
            for _ in 0..SAVE_LIGHT_PASSES {
                if !self.update_lighting() {
                    break;
                }
            }
        }
        self.data.last_played = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        let data = self.data.clone();
        self.store
            .storage_mut()
            .save_world_data(&data)
            .map_err(WorldError::WorldData)?;
        let saved = self.store.save_all(force, self.data.time, progress)?;
        if force {
            tracing::info!("Saved world '{}' ({} chunks written)", self.data.name, saved);
        }
        Ok(saved)
    }
}
