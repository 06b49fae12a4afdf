use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// JSON persistence for artifacts and proof reports.
pub trait Serializable {
    fn serialize_to_file(&self, path: &Path) -> Result<(), std::io::Error>;
    fn deserialize_from_file(path: &Path) -> Result<Self, std::io::Error>
    where
        Self: Sized;
}

impl<T> Serializable for T
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    fn serialize_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    fn deserialize_from_file(path: &Path) -> Result<Self, std::io::Error>
    where
        Self: Sized,
    {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
