use crate::{enums::LengthUnit, error::DoseWindowError, grid::DoseGrid, volume::DoseVolume};

use dicom::{
    core::Tag,
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder},
};
use dicom_dictionary_std::tags;
use ndarray::{Array3, Axis, s};
use std::{fs, path::Path};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DoseLoaderError {
    #[error("No RT Dose files found")]
    NoDoseFiles,

    #[error("Not an RT Dose object (modality {0})")]
    NotRtDose(String),

    #[error("Missing or unreadable attribute {0}")]
    MissingAttribute(&'static str),

    #[error("Grid frame offsets are not uniformly spaced")]
    NonUniformFrames,

    #[error("Pixel data error: {0}")]
    PixelData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error(transparent)]
    Dose(#[from] DoseWindowError),
}

/// Geometry and scaling read from an RT Dose header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoseHeader {
    pub grid: DoseGrid,
    /// Frames are stored with decreasing z and must be flipped.
    pub reversed_frames: bool,
    /// Factor turning stored pixel values into dose.
    pub scaling: f64,
}

pub struct DoseLoader;

impl DoseLoader {
    const FRAME_SPACING_TOLERANCE: f64 = 1e-3;

    /// Load a dose volume from a single RT Dose object
    ///
    /// # Arguments
    ///
    /// * `dicom_object` - RT Dose file object
    /// * `unit` - Length unit of the resulting grid
    ///
    /// # Errors
    ///
    /// Returns error if geometry attributes are missing, frames are unevenly
    /// spaced or the pixel data cannot be decoded
    pub fn load_from_dicom_object(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        unit: LengthUnit,
    ) -> Result<DoseVolume, DoseLoaderError> {
        let header = Self::read_header(dicom_object, unit)?;
        let data = Self::apply_header(&header, Self::decode_dose(dicom_object)?);

        debug!(
            counts = ?header.grid.counts(),
            voxel_size = ?header.grid.voxel_size(),
            scaling = header.scaling,
            "decoded RT Dose"
        );
        Ok(DoseVolume::from_array(header.grid, data)?)
    }

    /// Load a volume from file paths, summing the doses of all files
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        unit: LengthUnit,
    ) -> Result<DoseVolume, DoseLoaderError> {
        if paths.is_empty() {
            return Err(DoseLoaderError::NoDoseFiles);
        }
        let volumes = paths
            .iter()
            .map(|path| {
                let object = open_file(path.as_ref())?;
                Self::load_from_dicom_object(&object, unit)
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(files = volumes.len(), "loaded RT Dose files");
        Ok(DoseVolume::composite(&volumes)?)
    }

    /// Load a composite volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        unit: LengthUnit,
    ) -> Result<DoseVolume, DoseLoaderError> {
        let mut paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();
        paths.sort();

        Self::load_from_file_paths(&paths, unit)
    }

    /// Read the dose grid geometry from an RT Dose header.
    ///
    /// `ImagePositionPatient` locates the center of the first voxel, so the
    /// grid corner sits half a voxel below it on every axis.
    pub fn read_header(
        dicom_object: &InMemDicomObject,
        unit: LengthUnit,
    ) -> Result<DoseHeader, DoseLoaderError> {
        if let Some(modality) = dicom_object
            .element(tags::MODALITY)
            .ok()
            .and_then(|element| element.to_str().ok())
        {
            let modality = modality.trim();
            if !modality.eq_ignore_ascii_case("RTDOSE") {
                return Err(DoseLoaderError::NotRtDose(modality.to_string()));
            }
        }

        let columns = Self::int_value(dicom_object, tags::COLUMNS, "Columns")?;
        let rows = Self::int_value(dicom_object, tags::ROWS, "Rows")?;
        let frames = match dicom_object.element(tags::NUMBER_OF_FRAMES) {
            Ok(element) => element
                .to_int::<u32>()
                .map_err(|_| DoseLoaderError::MissingAttribute("NumberOfFrames"))?
                as usize,
            Err(_) => 1,
        };

        let pixel_spacing = Self::float_values(dicom_object, tags::PIXEL_SPACING, "PixelSpacing")?;
        let &[row_spacing, column_spacing] = pixel_spacing.as_slice() else {
            return Err(DoseLoaderError::MissingAttribute("PixelSpacing"));
        };
        let position = Self::float_values(
            dicom_object,
            tags::IMAGE_POSITION_PATIENT,
            "ImagePositionPatient",
        )?;
        let &[px, py, pz] = position.as_slice() else {
            return Err(DoseLoaderError::MissingAttribute("ImagePositionPatient"));
        };

        let (first_center_z, slice_spacing, reversed_frames) =
            Self::frame_geometry(dicom_object, pz, frames)?;

        let scaling = dicom_object
            .element(tags::DOSE_GRID_SCALING)
            .ok()
            .and_then(|element| element.to_float64().ok())
            .unwrap_or(1.0);

        let factor = unit.per_millimeter();
        let voxel_size = (
            column_spacing * factor,
            row_spacing * factor,
            slice_spacing * factor,
        );
        let corner = (
            px * factor - 0.5 * voxel_size.0,
            py * factor - 0.5 * voxel_size.1,
            first_center_z * factor - 0.5 * voxel_size.2,
        );
        let grid = DoseGrid::new(corner, (columns, rows, frames), voxel_size)?;

        Ok(DoseHeader {
            grid,
            reversed_frames,
            scaling,
        })
    }

    /// Lowest frame center, slice spacing and whether frames descend in z.
    fn frame_geometry(
        dicom_object: &InMemDicomObject,
        position_z: f64,
        frames: usize,
    ) -> Result<(f64, f64, bool), DoseLoaderError> {
        let offsets = dicom_object
            .element(tags::GRID_FRAME_OFFSET_VECTOR)
            .ok()
            .and_then(|element| element.to_multi_float64().ok());

        let offsets = match offsets {
            Some(offsets) if frames > 1 => offsets,
            _ if frames > 1 => {
                return Err(DoseLoaderError::MissingAttribute("GridFrameOffsetVector"));
            }
            _ => {
                let thickness = dicom_object
                    .element(tags::SLICE_THICKNESS)
                    .ok()
                    .and_then(|element| element.to_float64().ok())
                    .ok_or(DoseLoaderError::MissingAttribute("SliceThickness"))?;
                return Ok((position_z, thickness, false));
            }
        };
        if offsets.len() != frames {
            return Err(DoseLoaderError::MissingAttribute("GridFrameOffsetVector"));
        }

        // A zero first offset means the vector is relative to the image
        // position, otherwise it holds absolute z positions.
        let centers: Vec<f64> = if offsets[0] == 0.0 {
            offsets.iter().map(|offset| position_z + offset).collect()
        } else {
            offsets
        };

        let spacing = centers[1] - centers[0];
        let uniform = centers
            .windows(2)
            .all(|pair| ((pair[1] - pair[0]) - spacing).abs() < Self::FRAME_SPACING_TOLERANCE);
        if spacing == 0.0 || !uniform {
            return Err(DoseLoaderError::NonUniformFrames);
        }

        let reversed = spacing < 0.0;
        let lowest = if reversed {
            centers[centers.len() - 1]
        } else {
            centers[0]
        };
        Ok((lowest, spacing.abs(), reversed))
    }

    /// Put stored frames in ascending z order and convert them to dose.
    fn apply_header(header: &DoseHeader, mut data: Array3<f32>) -> Array3<f32> {
        if header.reversed_frames {
            data.invert_axis(Axis(0));
        }
        if header.scaling != 1.0 {
            let scaling = header.scaling as f32;
            data.mapv_inplace(|v| v * scaling);
        }
        data
    }

    fn decode_dose(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<Array3<f32>, DoseLoaderError> {
        let pixel_data = dicom_object
            .decode_pixel_data()
            .map_err(|e| DoseLoaderError::PixelData(e.to_string()))?;
        let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .map(|arr| arr.slice_move(s![.., .., .., 0]))
            .map_err(|e| DoseLoaderError::PixelData(e.to_string()))
    }

    fn int_value(
        dicom_object: &InMemDicomObject,
        tag: Tag,
        name: &'static str,
    ) -> Result<usize, DoseLoaderError> {
        dicom_object
            .element(tag)
            .ok()
            .and_then(|element| element.to_int::<u32>().ok())
            .map(|value| value as usize)
            .ok_or(DoseLoaderError::MissingAttribute(name))
    }

    fn float_values(
        dicom_object: &InMemDicomObject,
        tag: Tag,
        name: &'static str,
    ) -> Result<Vec<f64>, DoseLoaderError> {
        dicom_object
            .element(tag)
            .ok()
            .and_then(|element| element.to_multi_float64().ok())
            .ok_or(DoseLoaderError::MissingAttribute(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, VR};

    fn floats(values: &[f64]) -> PrimitiveValue {
        PrimitiveValue::F64(values.to_vec().into())
    }

    fn header_elements(offsets: &[f64]) -> Vec<DataElement<InMemDicomObject>> {
        vec![
            DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("RTDOSE")),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(3_u16)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(4_u16)),
            DataElement::new(
                tags::NUMBER_OF_FRAMES,
                VR::IS,
                PrimitiveValue::from(offsets.len().to_string()),
            ),
            DataElement::new(tags::PIXEL_SPACING, VR::DS, floats(&[2.0, 2.5])),
            DataElement::new(
                tags::IMAGE_POSITION_PATIENT,
                VR::DS,
                floats(&[-100.0, -50.0, 20.0]),
            ),
            DataElement::new(tags::GRID_FRAME_OFFSET_VECTOR, VR::DS, floats(offsets)),
            DataElement::new(tags::DOSE_GRID_SCALING, VR::DS, floats(&[0.5])),
        ]
    }

    fn close(a: (f64, f64, f64), b: (f64, f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9 && (a.2 - b.2).abs() < 1e-9
    }

    #[test]
    fn reads_grid_from_relative_offsets() {
        let object = InMemDicomObject::from_element_iter(header_elements(&[0.0, 3.0, 6.0]));
        let header = DoseLoader::read_header(&object, LengthUnit::Millimeter).unwrap();
        assert_eq!(header.grid.counts(), (4, 3, 3));
        assert!(close(header.grid.voxel_size(), (2.5, 2.0, 3.0)));
        assert!(close(header.grid.corner(), (-101.25, -51.0, 18.5)));
        assert!(!header.reversed_frames);
        assert_eq!(header.scaling, 0.5);
    }

    #[test]
    fn converts_to_centimeters() {
        let object = InMemDicomObject::from_element_iter(header_elements(&[0.0, 3.0, 6.0]));
        let header = DoseLoader::read_header(&object, LengthUnit::Centimeter).unwrap();
        assert!(close(header.grid.voxel_size(), (0.25, 0.2, 0.3)));
        assert!(close(header.grid.corner(), (-10.125, -5.1, 1.85)));
    }

    #[test]
    fn descending_offsets_are_flipped() {
        let object = InMemDicomObject::from_element_iter(header_elements(&[0.0, -3.0, -6.0]));
        let header = DoseLoader::read_header(&object, LengthUnit::Millimeter).unwrap();
        assert!(header.reversed_frames);
        assert!((header.grid.corner().2 - 12.5).abs() < 1e-9);
        assert!((header.grid.voxel_size().2 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn descending_frames_are_reordered_and_scaled() {
        let object = InMemDicomObject::from_element_iter(header_elements(&[0.0, -3.0, -6.0]));
        let header = DoseLoader::read_header(&object, LengthUnit::Millimeter).unwrap();
        let stored = Array3::from_shape_fn((3, 3, 4), |(z, _, _)| (z + 1) as f32 * 10.0);

        let data = DoseLoader::apply_header(&header, stored);
        let frame_values: Vec<f32> = (0..3).map(|z| data[[z, 1, 2]]).collect();
        assert_eq!(frame_values, vec![15.0, 10.0, 5.0]);

        let volume = DoseVolume::from_array(header.grid, data).unwrap();
        assert_eq!(volume.value_at(0, 0, 0), 15.0);
        assert_eq!(volume.value_at(3, 2, 2), 5.0);
    }

    #[test]
    fn ascending_frames_keep_their_order() {
        let header = DoseHeader {
            grid: DoseGrid::new((0.0, 0.0, 0.0), (1, 1, 3), (1.0, 1.0, 1.0)).unwrap(),
            reversed_frames: false,
            scaling: 1.0,
        };
        let stored = Array3::from_shape_vec((3, 1, 1), vec![1.0, 2.0, 3.0]).unwrap();
        let data = DoseLoader::apply_header(&header, stored);
        assert_eq!(data.iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn absolute_offsets_are_used_as_positions() {
        let object =
            InMemDicomObject::from_element_iter(header_elements(&[20.0, 22.0, 24.0]));
        let header = DoseLoader::read_header(&object, LengthUnit::Millimeter).unwrap();
        assert!((header.grid.corner().2 - 19.0).abs() < 1e-9);
        assert!((header.grid.voxel_size().2 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_uneven_frames() {
        let object = InMemDicomObject::from_element_iter(header_elements(&[0.0, 3.0, 7.0]));
        assert!(matches!(
            DoseLoader::read_header(&object, LengthUnit::Millimeter),
            Err(DoseLoaderError::NonUniformFrames)
        ));
    }

    #[test]
    fn rejects_other_modalities() {
        let mut elements = header_elements(&[0.0, 3.0]);
        elements[0] = DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT"));
        let object = InMemDicomObject::from_element_iter(elements);
        assert!(matches!(
            DoseLoader::read_header(&object, LengthUnit::Millimeter),
            Err(DoseLoaderError::NotRtDose(m)) if m == "CT"
        ));
    }

    #[test]
    fn missing_spacing_is_reported() {
        let elements: Vec<_> = header_elements(&[0.0, 3.0])
            .into_iter()
            .filter(|element| element.header().tag != tags::PIXEL_SPACING)
            .collect();
        let object = InMemDicomObject::from_element_iter(elements);
        assert!(matches!(
            DoseLoader::read_header(&object, LengthUnit::Millimeter),
            Err(DoseLoaderError::MissingAttribute("PixelSpacing"))
        ));
    }

    #[test]
    fn empty_path_list_is_rejected() {
        let paths: [&str; 0] = [];
        assert!(matches!(
            DoseLoader::load_from_file_paths(&paths, LengthUnit::Centimeter),
            Err(DoseLoaderError::NoDoseFiles)
        ));
    }
}
