//! HCI 协议常量
//!
//! 包类型前缀、事件码以及 TI 共享传输控制器的厂商命令。

// ============================================================================
// UART 包类型前缀（H4）
// ============================================================================

/// 命令包前缀
pub const HCI_COMMAND_PKT: u8 = 0x01;
/// ACL 数据包前缀
pub const HCI_ACLDATA_PKT: u8 = 0x02;
/// SCO 数据包前缀
pub const HCI_SCODATA_PKT: u8 = 0x03;
/// 事件包前缀（读取器按此字节同步）
pub const HCI_EVENT_PKT: u8 = 0x04;

// ============================================================================
// 事件码
// ============================================================================

/// Command Complete 事件
pub const EVT_CMD_COMPLETE: u8 = 0x0E;

/// Command Complete 最小参数长度：ncmd(1) + opcode(2) + status(1)
pub const EVT_CMD_COMPLETE_MIN_PLEN: u8 = 4;

// ============================================================================
// 厂商命令
// ============================================================================

/// HCI_VS_Update_UART_HCI_Baudrate（OGF 0x3F, OCF 0x336）
pub const HCI_VS_UPDATE_UART_BAUDRATE: u16 = 0xFF36;

// ============================================================================
// 帧尺寸
// ============================================================================

/// 命令包头长度：prefix + opcode(2) + plen
pub const COMMAND_HEADER_LEN: usize = 4;

/// 事件包头长度：prefix + event code + plen
pub const EVENT_HEADER_LEN: usize = 3;

/// Command Complete 接收缓冲区容量（头部 + 20 字节参数）
pub const COMMAND_COMPLETE_CAPACITY: usize = EVENT_HEADER_LEN + 20;
