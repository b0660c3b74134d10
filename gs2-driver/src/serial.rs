use crate::error::GsError;
use crate::time::sleep_ms;
use serialport::SerialPort;
use std::io::Read;
use std::time::{Duration, Instant};

pub(crate) fn open_port(name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, GsError> {
    let port = serialport::new(name, baud_rate)
        .timeout(Duration::from_millis(10))
        .open()?;
    Ok(port)
}

/// The sensor treats an asserted DTR line as a motor-stop request, so the
/// line is cleared right after opening the port.
pub(crate) fn clear_dtr(port: &mut Box<dyn SerialPort>) -> Result<(), GsError> {
    port.write_data_terminal_ready(false)?;
    Ok(())
}

pub(crate) fn send_data(port: &mut Box<dyn SerialPort>, data: &[u8]) -> std::io::Result<usize> {
    port.write(data)
}

pub(crate) fn get_n_read(port: &mut Box<dyn SerialPort>) -> Result<usize, GsError> {
    let n_u32: u32 = port.bytes_to_read()?;
    Ok(n_u32.try_into().unwrap_or(0))
}

pub(crate) fn flush(port: &mut Box<dyn SerialPort>) -> Result<(), GsError> {
    let n_read: usize = get_n_read(port).unwrap_or(0);
    if n_read == 0 {
        return Ok(());
    }
    let mut packet: Vec<u8> = vec![0; n_read];
    port.read(packet.as_mut_slice())?;
    Ok(())
}

/// Polls until at least `data_size` bytes are buffered or the timeout
/// elapses.
pub(crate) fn wait_for_data(
    port: &mut Box<dyn SerialPort>,
    data_size: usize,
    timeout: Duration,
) -> Result<(), GsError> {
    let deadline = Instant::now() + timeout;
    loop {
        if get_n_read(port)? >= data_size {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(GsError::Timeout);
        }
        sleep_ms(5);
    }
}

pub(crate) fn read(
    port: &mut Box<dyn SerialPort>,
    data_size: usize,
    timeout: Duration,
) -> Result<Vec<u8>, GsError> {
    assert!(data_size > 0);
    wait_for_data(port, data_size, timeout)?;
    let mut packet: Vec<u8> = vec![0; data_size];
    port.read_exact(packet.as_mut_slice())?;
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::TTYPort;
    use std::io::Write;

    #[test]
    fn test_read_returns_exactly_requested_bytes() {
        let (mut master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        master.write(&[0x01, 0x02, 0x03, 0x04]).unwrap();

        let mut slave_ptr = Box::new(slave) as Box<dyn SerialPort>;
        let data = read(&mut slave_ptr, 3, Duration::from_millis(100)).unwrap();
        assert_eq!(data, vec![0x01, 0x02, 0x03]);
        assert_eq!(get_n_read(&mut slave_ptr).unwrap(), 1);
    }

    #[test]
    fn test_read_times_out_without_data() {
        let (_master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        let mut slave_ptr = Box::new(slave) as Box<dyn SerialPort>;
        let e = read(&mut slave_ptr, 8, Duration::from_millis(30));
        assert!(matches!(e, Err(GsError::Timeout)));
    }

    #[test]
    fn test_flush_discards_pending_bytes() {
        let (mut master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        master.write(&[0xA5; 16]).unwrap();
        sleep_ms(10);

        let mut slave_ptr = Box::new(slave) as Box<dyn SerialPort>;
        flush(&mut slave_ptr).unwrap();
        assert_eq!(get_n_read(&mut slave_ptr).unwrap(), 0);
    }
}
