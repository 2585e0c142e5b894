// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! .deb file creation.

Writes the minimal well-formed binary package layout: a `debian-binary`
member, a `control.tar.gz` carrying the control paragraph, and a
`data.tar.gz` with the payload files. The server never builds packages in
production; the reindexer and metadata tests synthesize fixtures with this.
*/

use {
    crate::{control::ControlParagraph, error::Result},
    std::io::Write,
};

/// The format version written to `debian-binary`.
const DEBIAN_BINARY: &[u8] = b"2.0\n";

/// Builder of `.deb` binary packages.
pub struct DebBuilder {
    control: ControlParagraph,
    data_files: Vec<(String, Vec<u8>)>,
}

impl DebBuilder {
    /// Construct a builder from the package's control paragraph.
    pub fn new(control: ControlParagraph) -> Self {
        Self {
            control,
            data_files: Vec::new(),
        }
    }

    /// Add a payload file to `data.tar`.
    pub fn add_data_file(mut self, path: impl Into<String>, content: Vec<u8>) -> Self {
        self.data_files.push((path.into(), content));
        self
    }

    fn tar_gz(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
        let mut tar_builder = tar::Builder::new(Vec::new());

        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            tar_builder.append_data(&mut header, path, content.as_slice())?;
        }

        let tar_bytes = tar_builder.into_inner()?;

        let mut encoder = libflate::gzip::Encoder::new(Vec::new())?;
        encoder.write_all(&tar_bytes)?;
        Ok(encoder.finish().into_result()?)
    }

    /// Write the package to a writer.
    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        let control_files = vec![(
            "./control".to_string(),
            self.control.to_string().into_bytes(),
        )];
        let control_tar = Self::tar_gz(&control_files)?;
        let data_tar = Self::tar_gz(&self.data_files)?;

        let mut archive = ar::Builder::new(writer);

        let header = ar::Header::new(b"debian-binary".to_vec(), DEBIAN_BINARY.len() as u64);
        archive.append(&header, DEBIAN_BINARY)?;

        let header = ar::Header::new(b"control.tar.gz".to_vec(), control_tar.len() as u64);
        archive.append(&header, control_tar.as_slice())?;

        let header = ar::Header::new(b"data.tar.gz".to_vec(), data_tar.len() as u64);
        archive.append(&header, data_tar.as_slice())?;

        Ok(())
    }

    /// Write the package to an in-memory buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer)?;
        Ok(buffer)
    }
}
