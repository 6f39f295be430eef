#![allow(non_snake_case)]

//! JSON exchange of sparse matrices as triplet lists.

use crate::algebra::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::Write;
use std::{fs::File, io, io::Read};

// File layout: dimensions, the duplicate merge rule to apply on
// reading, and unordered (row, col, value) entries.

#[derive(Serialize, Deserialize)]
#[serde(bound = "T: Serialize + DeserializeOwned")]
struct JsonTripletData<T: FloatT> {
    m: usize,
    n: usize,
    #[serde(default)]
    duplicates: DuplicatePolicy,
    triplets: Vec<(usize, usize, T)>,
}

/// Reading and writing of sparse matrices as JSON triplet files
pub trait TripletJSONReadWrite: Sized {
    fn write_to_file(&self, file: &mut File) -> Result<(), io::Error>;
    fn read_from_file(file: &mut File) -> Result<Self, io::Error>;
}

impl<T> TripletJSONReadWrite for CscMatrix<T>
where
    T: FloatT + DeserializeOwned + Serialize,
{
    fn write_to_file(&self, file: &mut File) -> Result<(), io::Error> {
        let json_data = JsonTripletData {
            m: self.m,
            n: self.n,
            duplicates: DuplicatePolicy::KeepFirst,
            triplets: self.to_triplets(),
        };

        // JSON has no encoding for non-finite values
        if json_data.triplets.iter().any(|t| !t.2.is_finite()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "matrix holds non-finite values",
            ));
        }

        let json = serde_json::to_string(&json_data)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }

    fn read_from_file(file: &mut File) -> Result<Self, io::Error> {
        let mut buffer = String::new();
        file.read_to_string(&mut buffer)?;
        let json_data: JsonTripletData<T> = serde_json::from_str(&buffer)?;

        CscMatrix::from_triplets(
            json_data.m,
            json_data.n,
            &json_data.triplets,
            json_data.duplicates,
        )
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::{Seek, SeekFrom};

    #[test]
    fn test_json_io() {
        let A = CscMatrix::new(
            3,
            3,
            vec![0, 2, 4, 5],
            vec![0, 1, 1, 2, 2],
            vec![4., -1., 4., 0.1, 1e-300],
        );

        let mut file = tempfile::tempfile().unwrap();
        A.write_to_file(&mut file).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let B = CscMatrix::<f64>::read_from_file(&mut file).unwrap();
        assert_eq!(A, B);
    }

    #[test]
    fn test_json_duplicates_and_bad_rows() {
        let mut file = tempfile::tempfile().unwrap();
        let text = r#"{"m":2,"n":2,"duplicates":"Sum","triplets":[[1,0,1.5],[1,0,2.0],[0,1,3.0]]}"#;
        file.write_all(text.as_bytes()).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let A = CscMatrix::<f64>::read_from_file(&mut file).unwrap();
        assert_eq!(A.at(1, 0), 3.5);
        assert_eq!(A.nnz(), 2);

        let mut file = tempfile::tempfile().unwrap();
        let text = r#"{"m":2,"n":2,"triplets":[[5,0,1.0]]}"#;
        file.write_all(text.as_bytes()).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let err = CscMatrix::<f64>::read_from_file(&mut file).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_json_rejects_non_finite() {
        let A = CscMatrix::new(1, 1, vec![0, 1], vec![0], vec![f64::NAN]);
        let mut file = tempfile::tempfile().unwrap();
        assert!(A.write_to_file(&mut file).is_err());
    }
}
