use crate::prelude::*;
use cap_std::{ambient_authority, fs::Dir};
use serde::de::DeserializeOwned;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

/// Jokoshare data directory.
/// We will read a path from env `JOKOSHARE_DATA_DIR` or create a folder at data_local_dir/jokoshare, where data_local_dir is platform specific
/// Inside this directory, we will store the configuration file and the logs.
pub fn get_jokoshare_dir() -> Result<(PathBuf, Dir)> {
    let authoratah = ambient_authority();
    let data_dir_path = if let Ok(env_dir) = std::env::var("JOKOSHARE_DATA_DIR") {
        PathBuf::from(env_dir)
    } else {
        match directories_next::ProjectDirs::from("com.jokolay", "", "jokoshare") {
            Some(pd) => pd.data_local_dir().to_path_buf(),
            None => bail!("getting project dirs failed for some reason"),
        }
    };
    if data_dir_path.to_str().is_none() {
        bail!("jokoshare data dir is not utf-8: {data_dir_path:?}");
    }
    Dir::create_ambient_dir_all(&data_dir_path, authoratah)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to create jokoshare directory at {data_dir_path:?}"))?;
    let jdir = Dir::open_ambient_dir(&data_dir_path, authoratah)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to open jokoshare data dir at {data_dir_path:?}"))?;

    Ok((data_dir_path, jdir))
}

/// reads `name` from `dir` as json. if the file doesn't exist yet, we write `T::default()` into it and return that.
pub fn load_or_create_json<T>(dir: &Dir, name: &str) -> Result<T>
where
    T: DeserializeOwned + Serialize + Default,
{
    match dir.open(name) {
        Ok(file) => from_reader(std::io::BufReader::new(file))
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to deserialize {name}")),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("{name} doesn't exist. creating it with default values");
            let value = T::default();
            let contents = to_string_pretty(&value)
                .into_diagnostic()
                .wrap_err("failed to serialize default value")?;
            dir.create(name)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to create {name}"))?
                .write_all(contents.as_bytes())
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to write {name}"))?;
            Ok(value)
        }
        Err(e) => Err(e)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to open {name}")),
    }
}
