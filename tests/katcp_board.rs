//! End to end checks against an in-process KATCP server standing in for a SNAP board.

use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
    thread::{self, JoinHandle},
    time::Instant,
};

use hera_snap_diag::{
    Error,
    config::KatcpConfig,
    dump::{DEFAULT_DUMP, dump_to_file},
    fpga::{Fpga, KatcpFpga},
    katcp::{Kind, Message},
    spectrum::{AccumulationParams, acquire, even_source, odd_source},
};

const CLOCK_HZ: f64 = 250e6;

struct Board {
    running: bool,
    started: Instant,
    acc_reads: u32,
    regs: HashMap<String, Vec<u8>>,
    /// Registers that silently ignore writes.
    read_only: Vec<String>,
}

impl Board {
    fn new(nch: usize) -> Self {
        let mut regs = HashMap::new();
        regs.insert("acc_len".to_string(), 1u32.to_be_bytes().to_vec());
        regs.insert("version".to_string(), 0x0102_0304u32.to_be_bytes().to_vec());
        regs.insert("short".to_string(), vec![0xab, 0xcd]);
        for (k, p) in ["aa", "bb", "cc"].iter().enumerate() {
            let base = 1000 * (k as u32 + 1);
            let half = nch as u32 / 2;
            // include bytes that need escaping on the wire
            let even: Vec<u8> = (0..half)
                .flat_map(|i| (base + 2 * i + (0x0a << 8)).to_be_bytes())
                .collect();
            let odd: Vec<u8> = (0..half)
                .flat_map(|i| (base + 2 * i + 1 + (0x20 << 16)).to_be_bytes())
                .collect();
            regs.insert(even_source(p), even);
            regs.insert(odd_source(p), odd);
        }
        Board {
            running: true,
            started: Instant::now(),
            acc_reads: 0,
            regs,
            read_only: vec!["version".to_string()],
        }
    }

    fn reply(name: &str, args: Vec<Vec<u8>>) -> Message {
        Message {
            kind: Kind::Reply,
            name: name.to_string(),
            args,
        }
    }

    fn handle(&mut self, req: &Message) -> Message {
        let arg = |i: usize| req.arg_str(i).unwrap_or_default();
        match req.name.as_str() {
            "fpgastatus" if self.running => Self::reply("fpgastatus", vec![b"ok".to_vec()]),
            "fpgastatus" => Self::reply(
                "fpgastatus",
                vec![b"fail".to_vec(), b"no fpga programmed".to_vec()],
            ),
            "read" => {
                let name = arg(0);
                let len: usize = arg(2).parse().unwrap_or(0);
                let data = match name.as_str() {
                    "sys_clkcounter" => {
                        let ticks = self.started.elapsed().as_secs_f64() * CLOCK_HZ;
                        Some((ticks as u64 as u32).to_be_bytes().to_vec())
                    }
                    "acc_num" => {
                        self.acc_reads += 1;
                        Some((self.acc_reads / 2).to_be_bytes().to_vec())
                    }
                    _ => self.regs.get(&name).cloned(),
                };
                match data {
                    Some(mut d) => {
                        d.truncate(len);
                        Self::reply("read", vec![b"ok".to_vec(), d])
                    }
                    None => {
                        let reason = b"no such register".to_vec();
                        Self::reply("read", vec![b"fail".to_vec(), reason])
                    }
                }
            }
            "write" => {
                let name = arg(0);
                if !self.read_only.contains(&name) {
                    let data = req.args.get(2).cloned().unwrap_or_default();
                    self.regs.insert(name, data);
                }
                Self::reply("write", vec![b"ok".to_vec()])
            }
            other => Self::reply(other, vec![b"invalid".to_vec(), b"unknown request".to_vec()]),
        }
    }
}

fn serve(stream: TcpStream, mut board: Board) {
    let mut writer = stream.try_clone().unwrap();
    let reader = BufReader::new(stream);
    writer.write_all(b"#version-connect katcp-library 0.1\n").unwrap();
    for line in reader.split(b'\n') {
        let Ok(line) = line else { break };
        if line.is_empty() {
            continue;
        }
        let req = Message::parse(&line).unwrap();
        writer
            .write_all(b"#log info 0 raw read\\_register\\_called\n")
            .unwrap();
        if writer.write_all(&board.handle(&req).encode()).is_err() {
            break;
        }
    }
}

fn start(board: Board) -> (KatcpFpga, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        serve(stream, board);
    });
    let cfg = KatcpConfig {
        port: addr.port(),
        timeout_secs: 5.0,
    };
    let fpga = KatcpFpga::connect("127.0.0.1", &cfg).unwrap();
    (fpga, server)
}

#[test]
fn register_reads_skip_informs() {
    let (mut fpga, _server) = start(Board::new(8));
    assert!(fpga.is_running());
    assert_eq!(fpga.read_uint("version").unwrap(), 0x0102_0304);
    assert_eq!(fpga.read_uint("acc_num").unwrap(), 0);
    assert_eq!(fpga.read_uint("acc_num").unwrap(), 1);
}

#[test]
fn write_is_read_back() {
    let (mut fpga, _server) = start(Board::new(8));
    fpga.write_uint("acc_len", 0x0a0d_2000).unwrap();
    assert_eq!(fpga.read_uint("acc_len").unwrap(), 0x0a0d_2000);
    match fpga.write_uint("version", 7) {
        Err(Error::WriteVerify { written, read, .. }) => {
            assert_eq!((written, read), (7, 0x0102_0304));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn short_and_failed_reads() {
    let (mut fpga, _server) = start(Board::new(8));
    match fpga.read_uint("short") {
        Err(Error::ShortRead { expected, actual, .. }) => assert_eq!((expected, actual), (4, 2)),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(fpga.read_uint("missing"), Err(Error::Katcp { .. })));
}

#[test]
fn stopped_board_is_not_ready() {
    let mut board = Board::new(8);
    board.running = false;
    let (mut fpga, _server) = start(board);
    assert!(!fpga.is_running());
    let params = AccumulationParams {
        nch: 8,
        ..Default::default()
    };
    assert!(matches!(acquire(&mut fpga, &params), Err(Error::NotReady(_))));
}

#[test]
fn dropped_connection_is_not_ready() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let cfg = KatcpConfig {
        port: listener.local_addr().unwrap().port(),
        timeout_secs: 5.0,
    };
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        drop(stream);
    });
    let mut fpga = KatcpFpga::connect("127.0.0.1", &cfg).unwrap();
    server.join().unwrap();

    assert!(!fpga.is_running());
    let params = AccumulationParams {
        nch: 8,
        ..Default::default()
    };
    assert!(matches!(acquire(&mut fpga, &params), Err(Error::NotReady(_))));
}

#[test]
fn acquires_and_dumps_over_katcp() {
    let nch = 8;
    let (mut fpga, _server) = start(Board::new(nch));
    let params = AccumulationParams {
        nch,
        hard_acc_len: Some(1000),
        soft_repeats: 2,
        max_polls: Some(10),
        ..Default::default()
    };
    let spectra = acquire(&mut fpga, &params).unwrap();

    assert!((spectra.clk_mhz - 250.0).abs() < 5.0);
    assert_eq!(spectra.acc_len, 1000);
    assert_eq!(spectra.nch(), nch);
    assert_eq!(spectra.products.len(), 3);

    let (name, aa) = &spectra.products[0];
    assert_eq!(name, "aa");
    let even0 = (1000 + (0x0a << 8)) as u64;
    let odd0 = (1001 + (0x20 << 16)) as u64;
    assert_eq!(aa[0], 2 * even0);
    assert_eq!(aa[1], 2 * odd0);
    assert_eq!(aa[2], 2 * (even0 + 2));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DEFAULT_DUMP);
    dump_to_file(&path, &spectra).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with('#'));
    let rows: Vec<Vec<f64>> = lines
        .map(|l| l.split_whitespace().map(|f| f.parse().unwrap()).collect())
        .collect();
    assert_eq!(rows.len(), nch);
    assert!(rows.iter().all(|r| r.len() == 4));
    assert_eq!(rows[1][1], aa[1] as f64);
    assert!((rows[1][0] - spectra.freq_mhz[1]).abs() < 1e-9);
}
