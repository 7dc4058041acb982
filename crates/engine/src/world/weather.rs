use super::World;
use super::hook::{MutationContext, MutationKind};
use super::position::BlockPos;
use rand::Rng;
use std::f32::consts::PI;

pub const DAY_LENGTH: u64 = 24_000;
const STRENGTH_STEP: f32 = 0.01;

impl World {
    /// Advance the rain and thunder timers, toggling weather when they run
    /// out, and ease the strength values toward the current state.
    pub fn update_weather(&mut self) {
        if !self.config.has_sky {
            return;
        }

        if self.data.thunder_time <= 0 {
            self.data.thunder_time = if self.data.thundering {
                self.rng.gen_range(0..12_000) + 3_600
            } else {
                self.rng.gen_range(0..168_000) + 12_000
            };
        } else {
            self.data.thunder_time -= 1;
            if self.data.thunder_time <= 0 && self.weather_change_allowed() {
                self.data.thundering = !self.data.thundering;
                tracing::info!("Thunder {}", if self.data.thundering { "started" } else { "stopped" });
            }
        }

        if self.data.rain_time <= 0 {
            self.data.rain_time = if self.data.raining {
                self.rng.gen_range(0..12_000) + 12_000
            } else {
                self.rng.gen_range(0..168_000) + 12_000
            };
        } else {
            self.data.rain_time -= 1;
            if self.data.rain_time <= 0 && self.weather_change_allowed() {
                self.data.raining = !self.data.raining;
                tracing::info!("Rain {}", if self.data.raining { "started" } else { "stopped" });
            }
        }

        self.prev_rain = self.rain;
        self.rain = step_strength(self.rain, self.data.raining);
        self.prev_thunder = self.thunder;
        self.thunder = step_strength(self.thunder, self.data.thundering);
    }

    fn weather_change_allowed(&self) -> bool {
        let spawn = self.data.spawn;
        self.allows(
            MutationKind::WeatherChange,
            spawn,
            &MutationContext::new(self.get_block(spawn)),
        )
    }

    /// Force the weather. Timers restart on the next tick.
    pub fn set_weather(&mut self, raining: bool, thundering: bool) {
        self.data.raining = raining;
        self.data.thundering = thundering;
        self.data.rain_time = 0;
        self.data.thunder_time = 0;
    }

    pub fn is_raining(&self) -> bool {
        self.data.raining
    }

    pub fn is_thundering(&self) -> bool {
        self.data.thundering
    }

    /// Interpolated rain strength for a partial tick.
    pub fn rain_strength(&self, partial: f32) -> f32 {
        self.prev_rain + (self.rain - self.prev_rain) * partial
    }

    pub fn thunder_strength(&self, partial: f32) -> f32 {
        (self.prev_thunder + (self.thunder - self.prev_thunder) * partial) * self.rain_strength(partial)
    }

    /// Sun position in `0..1`, where 0 is noon and 0.5 midnight.
    pub fn celestial_angle(&self, partial: f32) -> f32 {
        let time = (self.data.time % DAY_LENGTH) as f32;
        let mut angle = (time + partial) / DAY_LENGTH as f32 - 0.25;
        if angle < 0.0 {
            angle += 1.0;
        }
        if angle > 1.0 {
            angle -= 1.0;
        }
        let raw = angle;
        let eased = 1.0 - ((angle * PI).cos() + 1.0) / 2.0;
        raw + (eased - raw) / 3.0
    }

    /// How much sky light is dimmed by night and weather, 0..=11.
    pub fn calculate_sky_subtracted(&self) -> u8 {
        let angle = self.celestial_angle(1.0);
        let mut brightness = 1.0 - ((angle * PI * 2.0).cos() * 2.0 + 0.5);
        brightness = brightness.clamp(0.0, 1.0);
        brightness = 1.0 - brightness;
        brightness *= 1.0 - self.rain_strength(1.0) * 5.0 / 16.0;
        brightness *= 1.0 - self.thunder_strength(1.0) * 5.0 / 16.0;
        brightness = 1.0 - brightness;
        (brightness * 11.0) as u8
    }

    pub fn sky_subtracted(&self) -> u8 {
        self.sky_subtracted
    }

    // ── Sleeping ──

    /// True when at least one player is online and every player has slept
    /// long enough.
    pub fn all_players_asleep(&self) -> bool {
        let mut players = self.players().peekable();
        players.peek().is_some() && players.all(|(_, p)| p.is_fully_asleep())
    }

    /// Skip to the next morning, wake everyone and clear the weather.
    pub(crate) fn skip_night(&mut self) {
        let next = (self.data.time + DAY_LENGTH) / DAY_LENGTH * DAY_LENGTH;
        tracing::info!("All players asleep, skipping to time {}", next);
        self.set_time(next);
        for entity in self.entities.values_mut() {
            if entity.is_player() {
                entity.sleeping = false;
                entity.sleep_ticks = 0;
            }
        }
        self.set_weather(false, false);
        for observer in &mut self.observers {
            observer.time_skipped(next);
        }
    }

    pub(crate) fn advance_sleepers(&mut self) {
        for entity in self.entities.values_mut() {
            if entity.sleeping && entity.sleep_ticks < super::entity::SLEEP_TICKS_REQUIRED {
                entity.sleep_ticks += 1;
            }
        }
    }

    /// Spawn position adjusted to the surface.
    pub fn spawn_surface(&self) -> BlockPos {
        let spawn = self.data.spawn;
        BlockPos::new(spawn.x, self.precipitation_height(spawn.x, spawn.z).max(1), spawn.z)
    }
}

fn step_strength(value: f32, active: bool) -> f32 {
    let next = if active {
        value + STRENGTH_STEP
    } else {
        value - STRENGTH_STEP
    };
    next.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_is_clamped() {
        assert_eq!(step_strength(1.0, true), 1.0);
        assert_eq!(step_strength(0.0, false), 0.0);
        assert!((step_strength(0.5, true) - 0.51).abs() < 1e-6);
    }
}
