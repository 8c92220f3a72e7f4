//! 波特率协商
//!
//! 在默认速率（115200）下发送厂商波特率切换命令，等待控制器的
//! Command Complete 确认。主机侧的速率切换由调用方在成功后完成。

use crate::ProtocolError;
use crate::command::SpeedChangeCommand;
use crate::constants::COMMAND_COMPLETE_CAPACITY;
use crate::event::{CommandComplete, HciEvent};
use crate::reader::FrameReader;
use std::io::{Read, Write};
use tracing::{debug, info};

/// 请求控制器切换到 `baud_rate`
///
/// 本函数不关闭端口，失败时由调用方决定如何处理会话。
pub fn negotiate_speed<P: Read + Write + ?Sized>(
    port: &mut P,
    baud_rate: u32,
    reader: &FrameReader,
) -> Result<CommandComplete, ProtocolError> {
    let cmd = SpeedChangeCommand::new(baud_rate);

    debug!("Sending speed change command: {} bps", baud_rate);
    port.write_all(&cmd.pack()).map_err(ProtocolError::Write)?;
    port.flush().map_err(ProtocolError::Write)?;

    let mut buf = [0u8; COMMAND_COMPLETE_CAPACITY];
    let len = reader.read_event(port, &mut buf)?;
    let event = HciEvent::parse(&buf[..len])?;
    let complete = event.expect_command_complete(cmd.opcode)?;

    info!("Controller accepted speed change to {} bps", baud_rate);
    Ok(complete)
}
