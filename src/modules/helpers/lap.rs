use serde::{Deserialize, Serialize};

use crate::modules::config::{RaceConfig, RankingMethod};
use crate::modules::helpers::math::Math;
use crate::modules::models::lap::{AverageWindow, Lap};
use crate::modules::models::race::Race;

const DEFAULT_AVERAGE_WINDOW: usize = 3;

pub struct LapHelper {}

/// Headline numbers of a race, as used for ranking.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RaceSummary {
    pub total_laps: usize,
    pub valid_laps: usize,
    pub fastest_lap: Option<Lap>,
    pub best_average: Option<AverageWindow>,
}

impl LapHelper {
    /// # compute average windows
    /// average every run of `window_size` consecutive laps (in capture order)
    /// in which all laps are valid. Runs containing an invalid lap are skipped.
    ///
    /// ## Arguments
    /// * `laps` - the laps of the race in capture order
    /// * `window_size` - laps per window, `None` or `0` means 3
    ///
    /// ## Returns
    /// * `Vec<AverageWindow>` - one entry per qualifying window, ordered by start lap
    pub fn compute_average_windows(laps: &[Lap], window_size: Option<usize>) -> Vec<AverageWindow> {
        let size = match window_size {
            Some(size) if size > 0 => size,
            _ => DEFAULT_AVERAGE_WINDOW,
        };

        laps.windows(size)
            .filter(|window| window.iter().all(|lap| lap.is_valid))
            .map(|window| {
                let times: Vec<f64> = window.iter().map(|lap| lap.time as f64).collect();
                AverageWindow {
                    start_lap_id: window[0].lap_id,
                    end_lap_id: window[size - 1].lap_id,
                    avg_time: Math::round_to_ms(Math::mean(&times)),
                }
            })
            .collect()
    }

    pub fn fastest_lap(laps: &[Lap]) -> Option<&Lap> {
        laps.iter()
            .filter(|lap| lap.is_valid)
            .min_by_key(|lap| lap.time)
    }

    pub fn best_average_window(windows: &[AverageWindow]) -> Option<&AverageWindow> {
        windows.iter().min_by_key(|window| window.avg_time)
    }

    pub fn race_summary(race: &Race, config: &RaceConfig) -> RaceSummary {
        let best_average = match config.ranking_method {
            RankingMethod::BestAverageLapTimeX => {
                LapHelper::best_average_window(&race.average_laps).cloned()
            }
            RankingMethod::BestLapTime => None,
        };

        RaceSummary {
            total_laps: race.laps.len(),
            valid_laps: race.valid_laps().count(),
            fastest_lap: LapHelper::fastest_lap(&race.laps).cloned(),
            best_average,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lap(lap_id: usize, time: u64, is_valid: bool) -> Lap {
        Lap {
            lap_id,
            time,
            resets: 0,
            is_valid,
            car_name: String::new(),
            model_id: String::new(),
            auto_timer_connected: false,
        }
    }

    #[test]
    fn single_full_window() {
        let laps = vec![lap(0, 30000, true), lap(1, 32000, true), lap(2, 31000, true)];
        assert_eq!(
            LapHelper::compute_average_windows(&laps, Some(3)),
            vec![AverageWindow { start_lap_id: 0, end_lap_id: 2, avg_time: 31000 }]
        );
    }

    #[test]
    fn invalid_lap_removes_window() {
        let laps = vec![lap(0, 30000, true), lap(1, 32000, false), lap(2, 31000, true)];
        assert!(LapHelper::compute_average_windows(&laps, Some(3)).is_empty());
    }

    #[test]
    fn invalid_lap_only_skips_windows_containing_it() {
        let laps = vec![
            lap(0, 10000, true),
            lap(1, 11000, true),
            lap(2, 12000, false),
            lap(3, 13000, true),
            lap(4, 14000, true),
            lap(5, 15001, true),
        ];
        let windows = LapHelper::compute_average_windows(&laps, Some(2));
        let ranges: Vec<(usize, usize)> = windows.iter().map(|w| (w.start_lap_id, w.end_lap_id)).collect();
        assert_eq!(ranges, vec![(0, 1), (3, 4), (4, 5)]);
        assert_eq!(windows[2].avg_time, 14501);
    }

    #[test]
    fn falsy_window_size_defaults_to_three() {
        let laps = vec![lap(0, 1000, true), lap(1, 1000, true), lap(2, 1001, true), lap(3, 1001, true)];
        assert_eq!(LapHelper::compute_average_windows(&laps, None).len(), 2);
        assert_eq!(LapHelper::compute_average_windows(&laps, Some(0)).len(), 2);
        // 3002 / 3 = 1000.67
        assert_eq!(LapHelper::compute_average_windows(&laps, None)[1].avg_time, 1001);
    }

    #[test]
    fn too_few_laps_yields_nothing() {
        let laps = vec![lap(0, 1000, true), lap(1, 1000, true)];
        assert!(LapHelper::compute_average_windows(&laps, Some(3)).is_empty());
    }

    #[test]
    fn fastest_lap_ignores_invalid() {
        let laps = vec![lap(0, 30000, true), lap(1, 20000, false), lap(2, 29000, true)];
        assert_eq!(LapHelper::fastest_lap(&laps).map(|l| l.lap_id), Some(2));
    }
}
