use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 引擎運行參數，可從情境檔的 [engine] 區塊載入
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub guard_wait_ms: u64,          // 區段鎖的最大等待時間
    pub waitlist_enabled: bool,      // 滿班時是否允許候補
    pub max_waitlist: Option<u32>,   // 候補名單長度上限
    pub auto_promote: bool,          // 退選後自動遞補
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            guard_wait_ms: 5000,
            waitlist_enabled: true,
            max_waitlist: None,
            auto_promote: true,
        }
    }
}

impl EngineSettings {
    /// 取得區段鎖等待時間
    pub fn guard_wait(&self) -> Duration {
        Duration::from_millis(self.guard_wait_ms)
    }
}

impl Validate for EngineSettings {
    fn validate(&self) -> Result<()> {
        // 等待超過一分鐘會讓呼叫端誤以為系統當掉
        validation::validate_range("engine.guard_wait_ms", self.guard_wait_ms, 1, 60_000)?;
        Ok(())
    }
}
