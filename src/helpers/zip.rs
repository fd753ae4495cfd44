//! Member lookup inside the ZIP containers used by `.xlsx` and `.ods` workbooks.

use crate::error::LabelError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Finds a member by name, ignoring ASCII case and accepting `\` as a separator.
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, LabelError>;

    /// Opens a member as a streaming XML document.
    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, LabelError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, LabelError> {
        let wanted = name.replace('\\', "/");
        let wanted = wanted.trim_start_matches('/');
        let Some(path) = self
            .file_names()
            .find(|candidate| wanted.eq_ignore_ascii_case(candidate.trim_start_matches('/')))
            .map(str::to_owned)
        else {
            return Ok(None);
        };
        match self.by_name(&path) {
            Ok(file) => Ok(Some(file)),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, LabelError> {
        Ok(self.file(name)?.map(|file| XmlReader::new(BufReader::new(file))))
    }
}
