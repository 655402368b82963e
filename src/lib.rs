/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of MZTAPE, a Rust library for recovering Sharp MZ cassette files.

    MZTAPE is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    MZTAPE is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
/*! # MZTAPE

A library for recovering files from audio recordings of Sharp MZ-80/MZ-700 cassette tapes.

The recovery is a two step process:

* The samples of the recording are demodulated into bits with [pulse::demodulate].
* The bits are read as a sequence of files, each one consisting of a header and
  a data region, with [formats::tape::TapeBlockReader].

The [utils::tape::TapeSession] combines both steps and hands the recovered files to
a [utils::tape::FileSink].

```
use mztape::audio::SampleCursor;
use mztape::utils::tape::{SessionConfig, TapeSession};

let samples: Vec<u8> = Vec::new(); // 8-bit unsigned PCM frames of a tape side
let mut session = TapeSession::new(SessionConfig::from_sample_rate(44100));
session.demodulate(SampleCursor::from(samples), |_| {});
let files = session.recover()?;
assert!(files.is_empty());
# Ok::<(), Box<dyn std::error::Error>>(())
```

## Features

* `formats` (default): the tape format reader.
* `utils` (default): the tape session helpers.
* `serde`: `Serialize`/`Deserialize` for configurations and file headers.
*/
pub use mztape_core::{audio, pulse};
pub use mztape_core::bitvec;

/// Tape format utilities.
#[cfg(feature = "formats")]
pub mod formats {
    pub use mztape_formats::*;
}

/// Tape session helpers.
#[cfg(feature = "utils")]
pub mod utils {
    pub use mztape_utils::*;
}
