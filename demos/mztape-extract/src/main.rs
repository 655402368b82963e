//! Recovers Sharp MZ cassette files from WAV recordings.
use std::io::{self, Read};
use std::str::FromStr;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use clap::clap_app;
use hound::{SampleFormat, WavReader};

use mztape::audio::{FromSample, SampleCursor};
use mztape::formats::tape::{ChecksumMode, ReaderConfig};
use mztape::utils::tape::{DirSink, FileSink, RecoveredFile, SessionConfig, TapeSession};

type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>;

/// Prints each recovered file's header and optionally writes the file.
struct PrintSink {
    dir: Option<DirSink>,
    json: bool
}

impl FileSink for PrintSink {
    fn store(&mut self, file: &RecoveredFile) -> io::Result<()> {
        if self.json {
            let json = serde_json::to_string_pretty(&file.header)
                                  .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            println!("{}", json);
        }
        else {
            println!("File #{}:\n{}\n", file.ordinal, file.header);
        }
        if let Some(dir) = self.dir.as_mut() {
            dir.store(file)?;
            info!("saved: {}", dir.path().join(file.file_name()).display());
        }
        Ok(())
    }
}

fn channel_samples<R, S, F>(wav: &mut WavReader<R>, channel: usize, conv: F) -> hound::Result<Vec<u8>>
    where R: Read, S: hound::Sample, F: Fn(S) -> u8
{
    let channels = usize::from(wav.spec().channels);
    wav.samples::<S>().skip(channel).step_by(channels)
                      .map(|sample| sample.map(&conv))
                      .collect()
}

/// Reads the selected channel of a WAV file as 8-bit unsigned PCM.
fn read_wav(path: &str, channel: usize) -> Result<(u32, Vec<u8>)> {
    let mut wav = WavReader::open(path)?;
    let spec = wav.spec();
    info!("{}: {} Hz, {} channel(s), {} bits {:?}",
            path, spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format);
    if channel >= usize::from(spec.channels) {
        return Err(format!("no channel {} in {}", channel, path).into())
    }
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => channel_samples(&mut wav, channel, |s: i8| u8::from_sample(s))?,
        (SampleFormat::Int, 16) => channel_samples(&mut wav, channel, |s: i16| u8::from_sample(s))?,
        (SampleFormat::Int, bits) if bits <= 32 => {
            let shift = 32 - u32::from(bits);
            channel_samples(&mut wav, channel, |s: i32| u8::from_sample(s << shift))?
        }
        (SampleFormat::Float, 32) => channel_samples(&mut wav, channel, |s: f32| u8::from_sample(s))?,
        (format, bits) => return Err(format!("unsupported sample format: {} bits {:?}", bits, format).into())
    };
    Ok((spec.sample_rate, samples))
}

fn main() -> Result<()> {
    let matches = clap_app!(mztape_extract =>
        (version: "0.1")
        (author: "Rafal Michalski")
        (about: "Recovers Sharp MZ-80/MZ-700 cassette files from WAV recordings")
        (@arg output: -o --output +takes_value "Directory to write recovered files to")
        (@arg channel: -c --channel +takes_value "WAV channel to demodulate (default: 0)")
        (@arg skip: --skip +takes_value "Long pulse boundary in samples (default: from sample rate)")
        (@arg threshold: --threshold +takes_value "Minimal pulse amplitude (default: 20)")
        (@arg comment_size: --("comment-size") +takes_value "Header comment size (default: 104)")
        (@arg files: --files +takes_value "Number of files to recover (default: 2)")
        (@arg strict: --strict "Fail on checksum mismatch")
        (@arg info: --info "Only print headers, don't write files")
        (@arg json: --json "Print headers as JSON")
        (@arg verbose: -v ... "Increases verbosity")
        (@arg INPUT: +required "WAV file with the tape recording")
    ).get_matches();

    let log_level = match matches.occurrences_of("verbose") {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace
    };
    env_logger::Builder::new().filter_level(log_level).parse_default_env().init();

    let input = matches.value_of("INPUT").ok_or("no input file")?;
    let channel = matches.value_of("channel").map(usize::from_str).transpose()?.unwrap_or(0);
    let (sample_rate, samples) = read_wav(input, channel)?;

    let mut config = SessionConfig::from_sample_rate(sample_rate);
    if let Some(skip) = matches.value_of("skip").map(u32::from_str).transpose()? {
        config.demod = config.demod.with_skip(skip);
    }
    if let Some(threshold) = matches.value_of("threshold").map(u8::from_str).transpose()? {
        config.demod = config.demod.with_threshold(threshold);
    }
    let mut reader = ReaderConfig::default();
    if let Some(size) = matches.value_of("comment_size").map(usize::from_str).transpose()? {
        reader = reader.with_comment_size(size);
    }
    if matches.is_present("strict") {
        reader = reader.with_checksum(ChecksumMode::Strict);
    }
    config = config.with_reader(reader);
    if let Some(files) = matches.value_of("files").map(usize::from_str).transpose()? {
        config = config.with_files(files);
    }
    debug!("{:?}", config);

    let mut session = TapeSession::new(config);
    session.demodulate(SampleCursor::from(samples), |fraction| {
        eprint!("\rdemodulating: {:3.0}%", fraction * 100.0);
    });
    eprintln!();

    let dir = if matches.is_present("info") {
        None
    }
    else {
        Some(DirSink::create(matches.value_of("output").unwrap_or("."))?)
    };
    let mut sink = PrintSink { dir, json: matches.is_present("json") };
    let count = session.extract(&mut sink)?;
    info!("recovered {} file(s)", count);
    Ok(())
}
