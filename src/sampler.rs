//! サンプリングモジュール
//!
//! 同一レベル・同一メッセージのログを一定間隔ごとに数え、
//! 最初の `initial` 件はそのまま出力し、それ以降は `thereafter` 件に1件だけ出力する

use crate::level::Level;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const BUCKETS: usize = 4096;

/// サンプリング設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingConfig {
    /// 間隔ごとにそのまま出力する件数
    pub initial: u64,
    /// 以降はこの件数に1件だけ出力（0なら以降はすべて破棄）
    pub thereafter: u64,
    /// カウンターをリセットする間隔
    pub tick: Duration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            initial: 100,
            thereafter: 100,
            tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
struct Counter {
    reset_at: AtomicI64,
    count: AtomicU64,
}

impl Counter {
    fn inc_check_reset(&self, now: i64, tick: i64) -> u64 {
        let reset_after = self.reset_at.load(Ordering::SeqCst);
        if reset_after > now {
            return self.count.fetch_add(1, Ordering::SeqCst) + 1;
        }

        self.count.store(1, Ordering::SeqCst);
        let new_reset_after = now.saturating_add(tick);
        if self
            .reset_at
            .compare_exchange(reset_after, new_reset_after, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // 他のスレッドが先にリセットした
            return self.count.fetch_add(1, Ordering::SeqCst) + 1;
        }
        1
    }
}

/// ロックフリーのサンプラー
#[derive(Debug)]
pub struct Sampler {
    config: SamplingConfig,
    epoch: Instant,
    counters: Box<[Counter]>,
}

impl Sampler {
    /// 新しいSamplerを作成
    pub fn new(config: SamplingConfig) -> Self {
        let counters = (0..Level::ALL.len() * BUCKETS)
            .map(|_| Counter::default())
            .collect();
        Self {
            config,
            epoch: Instant::now(),
            counters,
        }
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// このレコードを出力すべきかどうか
    ///
    /// Fatalは常に出力する
    pub fn check(&self, level: Level, message: &str) -> bool {
        let now = i64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(i64::MAX);
        self.check_at(level, message, now)
    }

    fn check_at(&self, level: Level, message: &str, now: i64) -> bool {
        if level == Level::Fatal {
            return true;
        }

        let bucket = fnv32a(message) as usize % BUCKETS;
        let counter = &self.counters[level.index() * BUCKETS + bucket];
        let tick = i64::try_from(self.config.tick.as_nanos()).unwrap_or(i64::MAX);
        let n = counter.inc_check_reset(now, tick);

        if n <= self.config.initial {
            return true;
        }
        self.config.thereafter != 0 && (n - self.config.initial) % self.config.thereafter == 0
    }
}

fn fnv32a(s: &str) -> u32 {
    const OFFSET: u32 = 2_166_136_261;
    const PRIME: u32 = 16_777_619;

    s.bytes()
        .fold(OFFSET, |hash, b| (hash ^ u32::from(b)).wrapping_mul(PRIME))
}
