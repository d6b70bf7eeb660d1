// Copyright (C) 2024, Cloudflare, Inc.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright notice,
//       this list of conditions and the following disclaimer.
//
//     * Redistributions in binary form must reproduce the above copyright
//       notice, this list of conditions and the following disclaimer in the
//       documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS
// IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO,
// THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR
// PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR
// CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL,
// EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO,
// PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE, DATA, OR
// PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF
// LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING
// NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS
// SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

/// Bytes sent but not yet acknowledged.
///
/// The count only grows through [`add`] and only shrinks through
/// [`saturating_subtract`], so duplicate or bogus acks can bring it down to
/// zero but never below.
///
/// [`add`]: BytesInFlight::add
/// [`saturating_subtract`]: BytesInFlight::saturating_subtract
#[derive(Debug, Default)]
pub struct BytesInFlight {
    bytes_in_flight: usize,
}

impl BytesInFlight {
    pub(crate) fn add(&mut self, delta: usize) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_add(delta);
    }

    pub(crate) fn saturating_subtract(&mut self, delta: usize) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(delta);
    }

    pub(crate) fn get(&self) -> usize {
        self.bytes_in_flight
    }
}
