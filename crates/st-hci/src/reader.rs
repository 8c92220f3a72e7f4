//! HCI 事件帧读取器
//!
//! 从字节流中读取一个完整的事件帧，分三个阶段：
//!
//! 1. **同步**：逐字节读取，直到遇到事件前缀 `0x04`。读取失败、读到 0 字节或
//!    读到非前缀字节都计为一次未命中；最多容忍 `retry_limit` 次，超出即失败。
//!    读取失败时先等待 `retry_delay` 再重试（容忍链路刚启动时的抖动）。
//! 2. **头部**：再读 2 个字节（事件码、参数长度），允许分多次读到，
//!    但任何一次读取失败都立即终止，不重试。
//! 3. **参数**：读取 `min(声明长度, 剩余容量)` 个字节，同样不重试。
//!    声明长度超过调用方缓冲区时静默截断，而不是报错。

use crate::ProtocolError;
use crate::constants::{EVENT_HEADER_LEN, HCI_EVENT_PKT};
use std::fmt;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, trace};

/// 帧读取阶段（用于错误报告）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Sync,
    Header,
    Payload,
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePhase::Sync => write!(f, "sync"),
            FramePhase::Header => write!(f, "header"),
            FramePhase::Payload => write!(f, "payload"),
        }
    }
}

/// 事件帧读取器（只保存重试策略，无内部缓冲）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReader {
    /// 同步阶段允许的未命中次数
    pub retry_limit: u32,
    /// 同步阶段读取失败后的等待时间
    pub retry_delay: Duration,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self {
            retry_limit: 4,
            retry_delay: Duration::from_millis(50),
        }
    }
}

impl FrameReader {
    pub fn new(retry_limit: u32, retry_delay: Duration) -> Self {
        Self {
            retry_limit,
            retry_delay,
        }
    }

    /// 读取一个事件帧到 `buf`
    ///
    /// `buf.len()` 即调用方容量，至少要能容纳 3 字节事件头。
    ///
    /// # 返回
    /// 写入 `buf` 的总字节数（前缀 + 头部 + 实际拷贝的参数）
    pub fn read_event<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        buf: &mut [u8],
    ) -> Result<usize, ProtocolError> {
        if buf.len() < EVENT_HEADER_LEN {
            return Err(ProtocolError::BufferTooSmall {
                capacity: buf.len(),
                required: EVENT_HEADER_LEN,
            });
        }

        self.synchronize(reader, buf)?;
        let mut count = 1;

        while count < EVENT_HEADER_LEN {
            count += read_some(
                reader,
                &mut buf[count..EVENT_HEADER_LEN],
                FramePhase::Header,
                count,
            )?;
        }

        let declared = buf[2] as usize;
        let remain = declared.min(buf.len() - EVENT_HEADER_LEN);
        if remain < declared {
            debug!(
                "HCI event declares {} parameter bytes, truncating to capacity {}",
                declared, remain
            );
        }

        let end = EVENT_HEADER_LEN + remain;
        while count < end {
            count += read_some(reader, &mut buf[count..end], FramePhase::Payload, count)?;
        }

        trace!("HCI event read: {:02X?}", &buf[..count]);
        Ok(count)
    }

    fn synchronize<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        buf: &mut [u8],
    ) -> Result<(), ProtocolError> {
        let mut misses = 0u32;

        loop {
            match reader.read(&mut buf[..1]) {
                Ok(1) if buf[0] == HCI_EVENT_PKT => return Ok(()),
                Ok(1) => {
                    trace!("Skipping non-prefix byte 0x{:02X}", buf[0]);
                },
                Ok(_) => {
                    trace!("Empty read while waiting for HCI event");
                    std::thread::sleep(self.retry_delay);
                },
                Err(e) => {
                    trace!("Read failed while waiting for HCI event: {}", e);
                    std::thread::sleep(self.retry_delay);
                },
            }

            misses += 1;
            if misses > self.retry_limit {
                return Err(ProtocolError::SyncLost { misses });
            }
        }
    }
}

/// 帧内读取：0 字节或错误都立即失败
fn read_some<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    phase: FramePhase,
    count: usize,
) -> Result<usize, ProtocolError> {
    match reader.read(buf) {
        Ok(0) => Err(ProtocolError::Truncated { phase, count }),
        Ok(n) => Ok(n),
        Err(source) => Err(ProtocolError::Read { phase, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// 按脚本返回数据的字节流
    enum Step {
        Data(Vec<u8>),
        WouldBlock,
    }

    struct Scripted {
        steps: VecDeque<Step>,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Step::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.steps.push_front(Step::Data(data.split_off(n)));
                    }
                    Ok(n)
                },
                Some(Step::WouldBlock) | None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }
    }

    fn fast_reader() -> FrameReader {
        FrameReader::new(4, Duration::ZERO)
    }

    const FRAME: [u8; 7] = [0x04, 0x0E, 0x04, 0x01, 0x36, 0xFF, 0x00];

    #[test]
    fn test_reads_clean_frame() {
        let mut stream = Scripted::new(vec![Step::Data(FRAME.to_vec())]);
        let mut buf = [0u8; 23];
        let n = fast_reader().read_event(&mut stream, &mut buf).unwrap();
        assert_eq!(n, 7);
        assert_eq!(&buf[..n], &FRAME);
    }

    #[test]
    fn test_synchronizes_after_leading_garbage() {
        for garbage in 0..=3usize {
            let mut data = vec![0xAAu8; garbage];
            data.extend_from_slice(&FRAME);
            let mut stream = Scripted::new(vec![Step::Data(data)]);
            let mut buf = [0u8; 23];
            let n = fast_reader().read_event(&mut stream, &mut buf).unwrap();
            assert_eq!(&buf[..n], &FRAME, "garbage bytes: {}", garbage);
        }
    }

    #[test]
    fn test_persistent_garbage_fails_sync() {
        let mut stream = Scripted::new(vec![Step::Data(vec![0x55; 64])]);
        let mut buf = [0u8; 23];
        let err = fast_reader().read_event(&mut stream, &mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::SyncLost { misses: 5 }));
    }

    #[test]
    fn test_tolerates_transient_empty_reads_during_sync() {
        let mut stream = Scripted::new(vec![
            Step::WouldBlock,
            Step::WouldBlock,
            Step::Data(vec![]),
            Step::Data(FRAME.to_vec()),
        ]);
        let mut buf = [0u8; 23];
        assert_eq!(fast_reader().read_event(&mut stream, &mut buf).unwrap(), 7);
    }

    #[test]
    fn test_silent_link_fails_sync() {
        let mut stream = Scripted::new(vec![]);
        let mut buf = [0u8; 23];
        assert!(
            fast_reader()
                .read_event(&mut stream, &mut buf)
                .unwrap_err()
                .is_sync_failure()
        );
    }

    #[test]
    fn test_header_failure_is_not_retried() {
        let mut stream = Scripted::new(vec![
            Step::Data(vec![0x04, 0x0E]),
            Step::WouldBlock,
            Step::Data(vec![0x04, 0x01, 0x36, 0xFF, 0x00]),
        ]);
        let mut buf = [0u8; 23];
        let err = fast_reader().read_event(&mut stream, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Read {
                phase: FramePhase::Header,
                ..
            }
        ));
    }

    #[test]
    fn test_payload_accumulates_partial_reads() {
        let mut stream = Scripted::new(vec![
            Step::Data(vec![0x04]),
            Step::Data(vec![0x0E]),
            Step::Data(vec![0x04, 0x01]),
            Step::Data(vec![0x36]),
            Step::Data(vec![0xFF, 0x00]),
        ]);
        let mut buf = [0u8; 23];
        let n = fast_reader().read_event(&mut stream, &mut buf).unwrap();
        assert_eq!(&buf[..n], &FRAME);
    }

    #[test]
    fn test_payload_stall_is_fatal() {
        // 参数只到了 1 个字节，之后链路无数据
        let mut stream = Scripted::new(vec![Step::Data(vec![0x04, 0x0E, 0x04, 0x01])]);
        let mut buf = [0u8; 23];
        assert!(matches!(
            fast_reader().read_event(&mut stream, &mut buf),
            Err(ProtocolError::Read {
                phase: FramePhase::Payload,
                ..
            })
        ));
    }

    #[test]
    fn test_eof_in_header_is_truncated() {
        let mut stream = io::Cursor::new(vec![0x04, 0x0E]);
        let mut buf = [0u8; 23];
        assert!(matches!(
            fast_reader().read_event(&mut stream, &mut buf),
            Err(ProtocolError::Truncated {
                phase: FramePhase::Header,
                count: 2
            })
        ));
    }

    #[test]
    fn test_eof_in_payload_is_truncated() {
        let mut stream = io::Cursor::new(vec![0x04, 0x0E, 0x04, 0x01]);
        let mut buf = [0u8; 23];
        assert!(matches!(
            fast_reader().read_event(&mut stream, &mut buf),
            Err(ProtocolError::Truncated {
                phase: FramePhase::Payload,
                count: 4
            })
        ));
    }

    #[test]
    fn test_declared_length_truncated_to_capacity() {
        let mut data = vec![0x04, 0x0E, 0xFF];
        data.extend(std::iter::repeat_n(0x11, 255));
        let mut stream = Scripted::new(vec![Step::Data(data)]);
        let mut buf = [0u8; 10];
        let n = fast_reader().read_event(&mut stream, &mut buf).unwrap();
        assert_eq!(n, 10);
        assert_eq!(buf[2], 0xFF);
        assert!(buf[3..].iter().all(|&b| b == 0x11));
    }

    #[test]
    fn test_rejects_buffer_smaller_than_header() {
        let mut stream = Scripted::new(vec![Step::Data(FRAME.to_vec())]);
        let mut buf = [0u8; 2];
        assert!(matches!(
            fast_reader().read_event(&mut stream, &mut buf),
            Err(ProtocolError::BufferTooSmall {
                capacity: 2,
                required: 3
            })
        ));
    }
}
