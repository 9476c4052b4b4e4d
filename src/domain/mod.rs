// 領域層：資料模型與對外介面 (ports)，不依賴任何 HTTP / 檔案實作

pub mod model;
pub mod ports;
