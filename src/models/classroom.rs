use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classroom {
    pub id: u64,
    /// Unique; saving an existing room number updates it in place
    pub room_number: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub image_paths: Vec<String>,
}
