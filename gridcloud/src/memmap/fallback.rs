/*
* Licensed to Elasticsearch B.V. under one or more contributor
* license agreements. See the NOTICE file distributed with
* this work for additional information regarding copyright
* ownership. Elasticsearch B.V. licenses this file to you under
* the Apache License, Version 2.0 (the "License"); you may
* not use this file except in compliance with the License.
* You may obtain a copy of the License at
*
*  http://www.apache.org/licenses/LICENSE-2.0
*
* Unless required by applicable law or agreed to in writing,
* software distributed under the License is distributed on an
* "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
* KIND, either express or implied.  See the License for the
* specific language governing permissions and limitations
* under the License.
*/

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Heap stand-in for a map. Backed by `u64` words so the bytes are 8-byte aligned.
pub struct MmapInner {
    words: Vec<u64>,
    len: usize,
    file: Option<(File, u64)>,
}

impl MmapInner {
    fn with_len(len: usize) -> MmapInner {
        MmapInner {
            words: vec![0; (len + 7) / 8],
            len,
            file: None,
        }
    }

    pub fn map(len: usize, file: &File, offset: u64) -> io::Result<MmapInner> {
        let mut inner = MmapInner::with_len(len);
        let mut handle = file;
        handle.seek(SeekFrom::Start(offset))?;
        handle.read_exact(inner.bytes_mut())?;
        Ok(inner)
    }

    pub fn map_mut(len: usize, file: &File, offset: u64) -> io::Result<MmapInner> {
        let mut inner = MmapInner::map(len, file, offset)?;
        inner.file = Some((file.try_clone()?, offset));
        Ok(inner)
    }

    pub fn map_anon(len: usize) -> io::Result<MmapInner> {
        Ok(MmapInner::with_len(len))
    }

    pub fn flush(&self, offset: usize, len: usize) -> io::Result<()> {
        if let Some((file, start)) = &self.file {
            let mut handle = file;
            handle.seek(SeekFrom::Start(*start + offset as u64))?;
            handle.write_all(&self.bytes()[offset..offset + len])?;
            handle.sync_data()?;
        }
        Ok(())
    }

    pub fn make_read_only(&mut self) -> io::Result<()> {
        self.file = None;
        Ok(())
    }

    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr(), self.len) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        unsafe { std::slice::from_raw_parts_mut(self.mut_ptr(), len) }
    }

    #[inline]
    pub fn ptr(&self) -> *const u8 {
        self.words.as_ptr() as *const u8
    }

    #[inline]
    pub fn mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr() as *mut u8
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
}
