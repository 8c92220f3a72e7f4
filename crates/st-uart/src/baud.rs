//! 波特率选择
//!
//! 只有枚举表中的速率会走自定义协商路径；115200 表示仅使用默认速率，
//! 其他值视为无效，跳过自定义路径并保持默认速率。

use std::fmt;

/// 主机与控制器上电后的默认速率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 控制器支持的自定义速率
pub const CUSTOM_BAUD_RATES: [u32; 18] = [
    9_600, 19_200, 38_400, 57_600, 230_400, 460_800, 500_000, 576_000, 921_600, 1_000_000,
    1_152_000, 1_500_000, 2_000_000, 2_500_000, 3_000_000, 3_500_000, 3_686_400, 4_000_000,
];

/// 启动参数中请求的速率
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudSelection {
    /// 115200，不协商
    Default,
    /// 需要协商的自定义速率
    Custom(u32),
    /// 不在支持列表中
    Unsupported(u32),
}

impl BaudSelection {
    pub fn from_requested(baud_rate: u32) -> Self {
        if baud_rate == DEFAULT_BAUD_RATE {
            BaudSelection::Default
        } else if CUSTOM_BAUD_RATES.contains(&baud_rate) {
            BaudSelection::Custom(baud_rate)
        } else {
            BaudSelection::Unsupported(baud_rate)
        }
    }

    /// 需要协商时返回目标速率
    pub fn custom_rate(self) -> Option<u32> {
        match self {
            BaudSelection::Custom(rate) => Some(rate),
            _ => None,
        }
    }

    /// 安装完成后主机侧的实际速率
    pub fn effective_rate(self) -> u32 {
        self.custom_rate().unwrap_or(DEFAULT_BAUD_RATE)
    }
}

impl fmt::Display for BaudSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaudSelection::Default => write!(f, "{} (default)", DEFAULT_BAUD_RATE),
            BaudSelection::Custom(rate) => write!(f, "{} (custom)", rate),
            BaudSelection::Unsupported(rate) => {
                write!(f, "{} (unsupported, using {})", rate, DEFAULT_BAUD_RATE)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rate_skips_negotiation() {
        let sel = BaudSelection::from_requested(115_200);
        assert_eq!(sel, BaudSelection::Default);
        assert_eq!(sel.custom_rate(), None);
        assert_eq!(sel.effective_rate(), 115_200);
    }

    #[test]
    fn test_listed_rates_are_custom() {
        for &rate in CUSTOM_BAUD_RATES.iter() {
            assert_eq!(BaudSelection::from_requested(rate).custom_rate(), Some(rate));
        }
        assert_eq!(
            BaudSelection::from_requested(9600),
            BaudSelection::Custom(9600)
        );
    }

    #[test]
    fn test_unlisted_rate_is_unsupported() {
        let sel = BaudSelection::from_requested(12_345);
        assert_eq!(sel, BaudSelection::Unsupported(12_345));
        assert_eq!(sel.custom_rate(), None);
        assert_eq!(sel.effective_rate(), DEFAULT_BAUD_RATE);
        assert!(sel.to_string().contains("unsupported"));
    }
}
